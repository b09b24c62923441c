//! Distribution cycle workflow.
//!
//! A cycle runs in two steps:
//!
//! 1. [`preview`] computes the outcome and drafts the statement. Nothing is
//!    written, so discarding the draft leaves no trace.
//! 2. [`commit`] re-runs the engine against fresh state and, inside a single
//!    transaction, applies every project update, stores the new balance and
//!    publishes the (possibly edited) statement. Any failure rolls the whole
//!    cycle back.

use chrono::Utc;
use sabil_funds::distribution::distribute;
use sabil_funds::report::{self, ReportDraft};
use sabil_funds::{
    Allocation, Amount, CycleRequest, DistributionFacts, DistributionOutcome, GlobalBalance,
    Report,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::drafting::Drafter;
use crate::errors::{PortalError, Result};

/// Body of `POST /api/distributions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub newly_collected: Amount,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    pub title: String,
    pub description: String,
    /// Balance shown in the preview the statement was written from.
    #[serde(default)]
    pub expected_balance: Option<Amount>,
    /// Total distributed shown in that preview.
    #[serde(default)]
    pub expected_distributed: Option<Amount>,
}

impl CommitRequest {
    pub fn cycle(&self) -> CycleRequest {
        CycleRequest {
            newly_collected: self.newly_collected,
            allocations: self.allocations.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub draft: ReportDraft,
    pub outcome: DistributionOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Committed {
    pub report: Report,
    pub balance: GlobalBalance,
    pub outcome: DistributionOutcome,
}

/// Compute a cycle and draft its statement without persisting anything.
pub async fn preview(
    pool: &SqlitePool,
    drafter: &Drafter,
    request: &CycleRequest,
) -> Result<Preview> {
    let projects = db::list_projects(pool, None).await?;
    let balance = db::get_balance(pool).await?;
    let outcome = distribute(request, balance.amount, &projects)?;

    let facts = DistributionFacts::from_outcome(&outcome);
    let prose = drafter.draft(&facts).await;
    let draft = report::compose(&outcome, Utc::now().date_naive(), prose.as_deref());

    Ok(Preview { draft, outcome })
}

/// Apply a cycle and publish its statement atomically.
pub async fn commit(pool: &SqlitePool, request: &CommitRequest) -> Result<Committed> {
    let title = request.title.trim();
    let description = request.description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(PortalError::Validation(
            "statement title and description are required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let projects = db::list_projects(&mut *tx, None).await?;
    let balance = db::get_balance(&mut *tx).await?;
    let outcome = distribute(&request.cycle(), balance.amount, &projects)?;
    check_expected(request, &outcome)?;

    for update in &outcome.updates {
        let applied = db::set_project_progress(
            &mut *tx,
            update.project_id,
            update.previous_amount,
            update.current_amount,
            update.status,
        )
        .await?;
        if !applied {
            warn!(
                "Project {} changed during the cycle; rolling back",
                update.project_id
            );
            return Err(PortalError::Conflict(format!(
                "project {} changed while the cycle was being applied",
                update.project_id
            )));
        }
    }

    db::save_balance(&mut *tx, outcome.new_balance).await?;
    let report = db::insert_report(
        &mut *tx,
        title,
        description,
        outcome.newly_collected,
        Utc::now(),
    )
    .await?;

    tx.commit().await?;

    info!(
        "Cycle committed: collected {} → distributed {} across {} projects, balance {} (report {})",
        outcome.newly_collected,
        outcome.total_distributed,
        outcome.updates.len(),
        outcome.new_balance.amount,
        report.id
    );

    Ok(Committed {
        report,
        balance: outcome.new_balance,
        outcome,
    })
}

/// Reject a commit whose figures no longer match the preview it was drafted
/// from, so a published statement never disagrees with what was applied.
fn check_expected(request: &CommitRequest, outcome: &DistributionOutcome) -> Result<()> {
    let checks = [
        ("balance", request.expected_balance, outcome.new_balance.amount),
        ("total distributed", request.expected_distributed, outcome.total_distributed),
    ];
    for (label, expected, actual) in checks {
        if let Some(expected) = expected {
            if expected != actual {
                warn!("Stale cycle preview: {label} {expected} expected, {actual} computed");
                return Err(PortalError::Conflict(format!(
                    "{label} is now {actual} instead of the previewed {expected}; preview again"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewProject;
    use reqwest::Client;
    use sabil_funds::ProjectStatus;

    async fn seed(pool: &SqlitePool, target: i64, current: i64) -> i64 {
        let p = db::insert_project(
            pool,
            &NewProject {
                title: "Minaret".into(),
                description: String::new(),
                image_url: String::new(),
                target_amount: Amount::from_major(target),
                is_important: true,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        if current > 0 {
            db::set_project_progress(
                pool,
                p.id,
                Amount::ZERO,
                Amount::from_major(current),
                ProjectStatus::for_amounts(Amount::from_major(current), p.target_amount),
            )
            .await
            .unwrap();
        }
        p.id
    }

    fn commit_request(collected: i64, allocations: Vec<(i64, i64)>) -> CommitRequest {
        CommitRequest {
            newly_collected: Amount::from_major(collected),
            allocations: allocations
                .into_iter()
                .map(|(project_id, amount)| Allocation {
                    project_id,
                    amount: Amount::from_major(amount),
                })
                .collect(),
            title: "Statement".into(),
            description: "Body".into(),
            expected_balance: None,
            expected_distributed: None,
        }
    }

    #[tokio::test]
    async fn preview_writes_nothing() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = seed(&pool, 1200, 1000).await;

        let request = commit_request(1000, vec![(id, 200)]).cycle();
        let preview = preview(&pool, &Drafter::disabled(Client::new()), &request)
            .await
            .unwrap();
        assert!(preview.draft.title.starts_with("Financial statement: proceeds of "));
        assert!(preview.draft.description.contains("Total distributed: 200.00 DZD"));

        let project = db::get_project(&pool, id).await.unwrap().unwrap();
        assert_eq!(project.current_amount, Amount::from_major(1000));
        assert!(db::list_reports(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_applies_everything_together() {
        let pool = db::init_memory_pool().await.unwrap();
        db::save_balance(&pool, GlobalBalance::clamped(Amount::from_major(500)))
            .await
            .unwrap();
        let id = seed(&pool, 1200, 1000).await;

        let committed = commit(&pool, &commit_request(1000, vec![(id, 200)]))
            .await
            .unwrap();
        assert_eq!(committed.balance.amount, Amount::from_major(1300));
        assert_eq!(committed.report.total_collected, Amount::from_major(1000));

        let project = db::get_project(&pool, id).await.unwrap().unwrap();
        assert_eq!(project.current_amount, Amount::from_major(1200));
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(
            db::get_balance(&pool).await.unwrap().amount,
            Amount::from_major(1300)
        );
        assert_eq!(db::list_reports(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_commit_changes_nothing() {
        let pool = db::init_memory_pool().await.unwrap();
        db::save_balance(&pool, GlobalBalance::clamped(Amount::from_major(500)))
            .await
            .unwrap();
        let id = seed(&pool, 1200, 1000).await;

        let err = commit(&pool, &commit_request(1000, vec![(id, 2000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Funds(_)));

        let project = db::get_project(&pool, id).await.unwrap().unwrap();
        assert_eq!(project.current_amount, Amount::from_major(1000));
        assert_eq!(
            db::get_balance(&pool).await.unwrap().amount,
            Amount::from_major(500)
        );
        assert!(db::list_reports(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_requires_statement_text() {
        let pool = db::init_memory_pool().await.unwrap();
        let mut request = commit_request(100, vec![]);
        request.title = "   ".into();
        assert!(matches!(
            commit(&pool, &request).await,
            Err(PortalError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stale_preview_is_rejected() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = seed(&pool, 1200, 1000).await;

        let mut request = commit_request(1000, vec![(id, 200)]);
        let previewed = preview(&pool, &Drafter::disabled(Client::new()), &request.cycle())
            .await
            .unwrap();
        request.expected_balance = Some(previewed.outcome.new_balance.amount);
        request.expected_distributed = Some(previewed.outcome.total_distributed);

        // Another cycle lands between the preview and the commit.
        commit(&pool, &commit_request(50, vec![])).await.unwrap();

        let err = commit(&pool, &request).await.unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
        let project = db::get_project(&pool, id).await.unwrap().unwrap();
        assert_eq!(project.current_amount, Amount::from_major(1000));
        assert_eq!(db::list_reports(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn matching_preview_commits() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = seed(&pool, 1200, 1000).await;

        let mut request = commit_request(1000, vec![(id, 200)]);
        request.expected_balance = Some(Amount::from_major(800));
        request.expected_distributed = Some(Amount::from_major(200));
        let committed = commit(&pool, &request).await.unwrap();
        assert_eq!(committed.balance.amount, Amount::from_major(800));
    }

    #[tokio::test]
    async fn drafted_prose_leads_the_preview() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = seed(&pool, 1200, 0).await;
        let drafter = Drafter::new(
            Client::new(),
            Some(crate::drafting::tests::drafting_service().await),
            std::time::Duration::from_secs(5),
        );

        let request = commit_request(300, vec![(id, 300)]).cycle();
        let preview = preview(&pool, &drafter, &request).await.unwrap();
        assert!(preview
            .draft
            .description
            .starts_with("Alhamdulillah, 300.0 DZD were collected this week.\n\n"));
        assert!(preview.draft.description.contains("Total distributed: 300.00 DZD"));
    }
}
