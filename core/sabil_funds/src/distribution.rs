//! # Fund distribution
//!
//! Splits a newly collected amount plus the carried-over balance across the
//! projects the admin picked, and computes the balance to carry forward.
//!
//! [`distribute`] is pure: it reads a snapshot of projects and the prior
//! balance and returns a [`DistributionOutcome`] describing every change.
//! Nothing is applied until the caller persists the outcome, so a rejected
//! cycle can never leave partial state behind.
//!
//! ## Rules
//!
//! | Check                                              | Error                 |
//! |----------------------------------------------------|-----------------------|
//! | collected amount is negative                       | `NegativeAmount`      |
//! | an allocation is negative                          | `NegativeAllocation`  |
//! | the same project appears twice                     | `DuplicateAllocation` |
//! | project id is unknown                              | `UnknownProject`      |
//! | project is already completed                       | `ProjectNotActive`    |
//! | requested total exceeds collected + prior balance  | `OverAllocation`      |
//! | a total does not fit in 64-bit centimes            | `AmountOverflow`      |
//! | nothing collected and nothing allocated            | `NothingToDistribute` |
//!
//! Accepted allocations are capped at each project's remaining need, so no
//! project ever ends above its target.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{Amount, GlobalBalance, Project, ProjectStatus};
use crate::FundsError;

/// Admin-chosen amount for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub project_id: i64,
    pub amount: Amount,
}

/// Input of one distribution cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRequest {
    pub newly_collected: Amount,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

/// The change a cycle makes to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub project_id: i64,
    pub title: String,
    /// Effective allocation, after capping.
    pub allocated: Amount,
    /// What the admin asked for.
    pub requested: Amount,
    pub previous_amount: Amount,
    pub current_amount: Amount,
    pub target_amount: Amount,
    pub status: ProjectStatus,
    /// `true` when this cycle moved the project from Active to Completed.
    pub completed_now: bool,
}

/// Everything a cycle computes, ready to be persisted and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutcome {
    pub newly_collected: Amount,
    pub prior_balance: Amount,
    pub total_available: Amount,
    pub total_distributed: Amount,
    pub new_balance: GlobalBalance,
    pub updates: Vec<ProjectUpdate>,
}

impl DistributionOutcome {
    /// Apply the computed updates to a project list in place.
    ///
    /// Projects without an update are left untouched.
    pub fn apply_to(&self, projects: &mut [Project]) {
        let by_id: HashMap<i64, &ProjectUpdate> =
            self.updates.iter().map(|u| (u.project_id, u)).collect();
        for project in projects.iter_mut() {
            if let Some(update) = by_id.get(&project.id) {
                project.current_amount = update.current_amount;
                project.status = update.status;
            }
        }
    }
}

/// Projects eligible to receive an allocation, in the order given.
pub fn allocation_candidates(projects: &[Project]) -> Vec<&Project> {
    projects.iter().filter(|p| p.is_active()).collect()
}

/// Run one distribution cycle against a snapshot of the projects.
///
/// `projects` may contain completed projects; only active ones can be
/// allocated to. A negative `prior_balance` is treated as zero.
pub fn distribute(
    request: &CycleRequest,
    prior_balance: Amount,
    projects: &[Project],
) -> Result<DistributionOutcome, FundsError> {
    if request.newly_collected.is_negative() {
        return Err(FundsError::NegativeAmount(request.newly_collected));
    }

    let prior_balance = prior_balance.clamp_non_negative();
    let total_available = request
        .newly_collected
        .checked_add(prior_balance)
        .ok_or(FundsError::AmountOverflow)?;

    let by_id: HashMap<i64, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let mut seen = HashSet::with_capacity(request.allocations.len());
    let mut targets = Vec::with_capacity(request.allocations.len());

    for alloc in &request.allocations {
        if alloc.amount.is_negative() {
            return Err(FundsError::NegativeAllocation {
                project_id: alloc.project_id,
                amount: alloc.amount,
            });
        }
        if !seen.insert(alloc.project_id) {
            return Err(FundsError::DuplicateAllocation(alloc.project_id));
        }
        let project = by_id
            .get(&alloc.project_id)
            .copied()
            .ok_or(FundsError::UnknownProject(alloc.project_id))?;
        if !project.is_active() {
            return Err(FundsError::ProjectNotActive(alloc.project_id));
        }
        targets.push((project, alloc.amount));
    }

    let requested = targets
        .iter()
        .try_fold(Amount::ZERO, |sum, (_, amount)| sum.checked_add(*amount))
        .ok_or(FundsError::AmountOverflow)?;
    if requested > total_available {
        return Err(FundsError::OverAllocation {
            requested,
            available: total_available,
        });
    }

    let mut updates = Vec::with_capacity(targets.len());
    for (project, requested) in targets {
        let allocated = requested.min(project.remaining_need());
        if allocated.is_zero() {
            continue;
        }
        let current_amount = project.current_amount + allocated;
        let status = ProjectStatus::for_amounts(current_amount, project.target_amount);
        updates.push(ProjectUpdate {
            project_id: project.id,
            title: project.title.clone(),
            allocated,
            requested,
            previous_amount: project.current_amount,
            current_amount,
            target_amount: project.target_amount,
            status,
            completed_now: status == ProjectStatus::Completed,
        });
    }

    let total_distributed: Amount = updates.iter().map(|u| u.allocated).sum();
    if request.newly_collected.is_zero() && total_distributed.is_zero() {
        return Err(FundsError::NothingToDistribute);
    }

    Ok(DistributionOutcome {
        newly_collected: request.newly_collected,
        prior_balance,
        total_available,
        total_distributed,
        new_balance: GlobalBalance::clamped(total_available - total_distributed),
        updates,
    })
}
