#![allow(dead_code)]

use crate::distribution::DistributionOutcome;
use crate::types::{Amount, Project, ProjectStatus};

/// INV-1: status is Completed exactly when the target is reached.
pub fn assert_status_matches_amounts(project: &Project) {
    assert_eq!(
        project.status,
        ProjectStatus::for_amounts(project.current_amount, project.target_amount),
        "project {} has status {:?} with {} of {}",
        project.id,
        project.status,
        project.current_amount,
        project.target_amount
    );
}

/// INV-2: a project never holds more than its target.
pub fn assert_within_target(project: &Project) {
    assert!(
        project.current_amount <= project.target_amount,
        "project {} holds {} above its target {}",
        project.id,
        project.current_amount,
        project.target_amount
    );
}

/// INV-3: the carried-forward balance is never negative.
pub fn assert_balance_non_negative(outcome: &DistributionOutcome) {
    assert!(
        !outcome.new_balance.amount.is_negative(),
        "negative balance {}",
        outcome.new_balance.amount
    );
}

/// INV-4: every centime available is either in a project or in the balance.
pub fn assert_conservation(outcome: &DistributionOutcome) {
    let deltas: Amount = outcome
        .updates
        .iter()
        .map(|u| u.current_amount - u.previous_amount)
        .sum();
    assert_eq!(
        deltas + outcome.new_balance.amount,
        outcome.prior_balance + outcome.newly_collected,
        "conservation broken: {} distributed + {} kept != {} + {}",
        deltas,
        outcome.new_balance.amount,
        outcome.prior_balance,
        outcome.newly_collected
    );
}

/// INV-5: `currentAmount` only grows.
pub fn assert_monotonic(before: &Project, after: &Project) {
    assert!(
        after.current_amount >= before.current_amount,
        "project {} went from {} down to {}",
        before.id,
        before.current_amount,
        after.current_amount
    );
}

/// Run all per-project invariants.
pub fn assert_all_project_invariants(project: &Project) {
    assert_status_matches_amounts(project);
    assert_within_target(project);
}

/// Run all invariants for an accepted cycle.
pub fn assert_all_cycle_invariants(outcome: &DistributionOutcome, before: &[Project], after: &[Project]) {
    assert_balance_non_negative(outcome);
    assert_conservation(outcome);
    for (b, a) in before.iter().zip(after) {
        assert_monotonic(b, a);
        assert_all_project_invariants(a);
    }
}
