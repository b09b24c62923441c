use chrono::Utc;

use crate::distribution::{distribute, Allocation, CycleRequest};
use crate::invariants::{assert_all_cycle_invariants, assert_all_project_invariants};
use crate::types::{Amount, Project, ProjectStatus};
use crate::FundsError;

fn project(id: i64, target: Amount, current: Amount) -> Project {
    Project {
        id,
        title: format!("Project {id}"),
        description: String::new(),
        image_url: String::new(),
        target_amount: target,
        current_amount: current,
        is_important: id % 2 == 0,
        status: ProjectStatus::for_amounts(current, target),
        created_at: Utc::now(),
    }
}

fn major(units: i64) -> Amount {
    Amount::from_major(units)
}

fn alloc(project_id: i64, amount: Amount) -> Allocation {
    Allocation { project_id, amount }
}

#[test]
fn test_completing_cycle_carries_the_rest() {
    let before = vec![project(1, major(1200), major(1000))];
    let request = CycleRequest {
        newly_collected: major(1000),
        allocations: vec![alloc(1, major(200))],
    };

    let outcome = distribute(&request, major(500), &before).unwrap();
    let mut after = before.clone();
    outcome.apply_to(&mut after);

    assert_eq!(after[0].current_amount, major(1200));
    assert_eq!(after[0].status, ProjectStatus::Completed);
    assert_eq!(outcome.new_balance.amount, major(1300));
    assert_all_cycle_invariants(&outcome, &before, &after);
}

#[test]
fn test_over_allocation_is_rejected_without_changes() {
    let before = vec![project(1, major(1200), major(1000))];
    let request = CycleRequest {
        newly_collected: major(1000),
        allocations: vec![alloc(1, major(2000))],
    };

    let err = distribute(&request, major(500), &before).unwrap_err();
    assert_eq!(
        err,
        FundsError::OverAllocation {
            requested: major(2000),
            available: major(1500),
        }
    );
}

#[test]
fn test_empty_cycle_is_rejected() {
    let before = vec![project(1, major(1200), major(1000))];
    let request = CycleRequest {
        newly_collected: Amount::ZERO,
        allocations: vec![alloc(1, Amount::ZERO)],
    };

    assert_eq!(
        distribute(&request, major(500), &before).unwrap_err(),
        FundsError::NothingToDistribute
    );
}

#[test]
fn test_two_projects_updated_independently() {
    let before = vec![
        project(1, major(5000), major(1000)),
        project(2, major(800), major(100)),
    ];
    let request = CycleRequest {
        newly_collected: major(900),
        allocations: vec![alloc(1, major(300)), alloc(2, major(250))],
    };

    let outcome = distribute(&request, major(100), &before).unwrap();
    let mut after = before.clone();
    outcome.apply_to(&mut after);

    assert_eq!(outcome.new_balance.amount, major(1000) - major(550));
    assert_eq!(after[0].current_amount, major(1300));
    assert_eq!(after[0].status, ProjectStatus::Active);
    assert_eq!(after[1].current_amount, major(350));
    assert_eq!(after[1].status, ProjectStatus::Active);
    assert_all_cycle_invariants(&outcome, &before, &after);
}

#[test]
fn test_fractional_amounts_stay_exact() {
    let before = vec![project(1, Amount::from_cents(100_001), Amount::ZERO)];
    let request = CycleRequest {
        newly_collected: Amount::from_major_f64(0.1).unwrap(),
        allocations: vec![alloc(1, Amount::from_major_f64(0.3).unwrap())],
    };

    let outcome = distribute(&request, Amount::from_major_f64(0.2).unwrap(), &before).unwrap();
    assert_eq!(outcome.total_distributed.cents(), 30);
    assert_eq!(outcome.new_balance.amount, Amount::ZERO);
}

/// Small deterministic generator so the sweep below is reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> i64 {
        (self.next() % bound) as i64
    }
}

#[test]
fn test_invariants_hold_across_many_cycles() {
    let mut rng = XorShift(0x5ab1_1a1c_4a1e_0001);
    let mut projects: Vec<Project> = (1..=6)
        .map(|id| project(id, Amount::from_cents(50_000 + rng.below(500_000)), Amount::ZERO))
        .collect();
    let mut balance = Amount::ZERO;

    for _ in 0..500 {
        let collected = Amount::from_cents(rng.below(200_000));
        let available = collected + balance;

        let mut allocations = Vec::new();
        let mut budget = available.cents();
        for p in projects.iter().filter(|p| p.is_active()) {
            if rng.below(3) == 0 || budget == 0 {
                continue;
            }
            let amount = rng.below(budget as u64 + 1);
            budget -= amount;
            allocations.push(alloc(p.id, Amount::from_cents(amount)));
        }

        let request = CycleRequest {
            newly_collected: collected,
            allocations,
        };
        let before = projects.clone();
        match distribute(&request, balance, &projects) {
            Ok(outcome) => {
                outcome.apply_to(&mut projects);
                assert_all_cycle_invariants(&outcome, &before, &projects);
                balance = outcome.new_balance.amount;
            }
            Err(FundsError::NothingToDistribute) => {
                assert!(collected.is_zero());
                assert_eq!(projects, before);
            }
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    for p in &projects {
        assert_all_project_invariants(p);
    }
}
