//! # Report composer
//!
//! Turns a [`DistributionOutcome`] into a draft financial statement.
//!
//! Prose may come from an external drafting service; the numeric summary is
//! always built here so the published body carries the collected,
//! distributed and carried-forward totals even when no prose is available.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::distribution::DistributionOutcome;
use crate::types::Amount;

/// Currency label used in statement bodies.
pub const CURRENCY: &str = "DZD";

/// One project's share of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectShare {
    pub project_id: i64,
    pub title: String,
    pub allocated: Amount,
    pub current_amount: Amount,
    pub target_amount: Amount,
    pub completed: bool,
}

/// The numbers a statement must reflect.
///
/// This is also the payload sent to the drafting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionFacts {
    pub newly_collected: Amount,
    pub prior_balance: Amount,
    pub total_available: Amount,
    pub total_distributed: Amount,
    pub new_balance: Amount,
    pub shares: Vec<ProjectShare>,
}

impl DistributionFacts {
    pub fn from_outcome(outcome: &DistributionOutcome) -> Self {
        DistributionFacts {
            newly_collected: outcome.newly_collected,
            prior_balance: outcome.prior_balance,
            total_available: outcome.total_available,
            total_distributed: outcome.total_distributed,
            new_balance: outcome.new_balance.amount,
            shares: outcome
                .updates
                .iter()
                .map(|u| ProjectShare {
                    project_id: u.project_id,
                    title: u.title.clone(),
                    allocated: u.allocated,
                    current_amount: u.current_amount,
                    target_amount: u.target_amount,
                    completed: u.completed_now,
                })
                .collect(),
        }
    }
}

/// A statement awaiting admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub total_collected: Amount,
    pub facts: DistributionFacts,
}

/// `Financial statement: proceeds of 16/10/2026`
pub fn draft_title(day: NaiveDate) -> String {
    format!("Financial statement: proceeds of {}", day.format("%d/%m/%Y"))
}

/// Plain numeric summary of a cycle.
pub fn template_body(facts: &DistributionFacts) -> String {
    let mut lines = vec![
        format!("Newly collected: {} {CURRENCY}", facts.newly_collected),
        format!("Total distributed: {} {CURRENCY}", facts.total_distributed),
    ];

    for share in &facts.shares {
        let mut line = format!(
            "- {}: {} {CURRENCY} ({} / {} {CURRENCY})",
            share.title, share.allocated, share.current_amount, share.target_amount
        );
        if share.completed {
            line.push_str(", target reached");
        }
        lines.push(line);
    }

    lines.push(format!(
        "Balance carried forward: {} {CURRENCY}",
        facts.new_balance
    ));
    lines.join("\n")
}

/// Compose the draft for a cycle.
///
/// Blank `prose` is ignored. When prose is present it leads the body and the
/// numeric summary follows it.
pub fn compose(outcome: &DistributionOutcome, day: NaiveDate, prose: Option<&str>) -> ReportDraft {
    let facts = DistributionFacts::from_outcome(outcome);
    let summary = template_body(&facts);

    let description = match prose.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prose) => format!("{prose}\n\n{summary}"),
        None => summary,
    };

    ReportDraft {
        title: draft_title(day),
        description,
        total_collected: outcome.newly_collected,
        facts,
    }
}

/// Ready-made project description for when no drafted text is available.
pub fn project_description(title: &str) -> String {
    let title = title.trim();
    format!(
        "{title} is a project of our mosque, funded entirely by the community. \
         Every contribution brings it closer to completion, and each financial \
         statement shows how much has been allocated to it so far."
    )
}
