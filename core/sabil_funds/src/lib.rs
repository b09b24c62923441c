//! # Sabil al-Khair funds ledger
//!
//! Domain model and rules for a mosque's donation transparency board: projects
//! with funding progress, periodic distribution of collected donations, and
//! the financial statement published for each distribution.
//!
//! | Concern      | Entry point(s)                                   |
//! |--------------|--------------------------------------------------|
//! | Data model   | [`Project`], [`Report`], [`Settings`], [`GlobalBalance`] |
//! | Distribution | [`distribution::distribute`]                     |
//! | Statements   | [`report::compose`], [`report::template_body`]   |
//! | Descriptions | [`report::project_description`]                  |
//!
//! ## Architecture
//!
//! This crate does no I/O. Callers load a snapshot of the projects and the
//! carried-over balance, run [`distribution::distribute`], and persist the
//! returned [`distribution::DistributionOutcome`] however they see fit.

pub mod distribution;
pub mod report;
mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_cycles;

use thiserror::Error;

pub use distribution::{Allocation, CycleRequest, DistributionOutcome, ProjectUpdate};
pub use report::{DistributionFacts, ReportDraft};
pub use types::{
    Amount, GlobalBalance, Project, ProjectStatus, Report, Settings, DEFAULT_MOSQUE_NAME,
    PLACEHOLDER_IMAGE_URL,
};

/// Rejections raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundsError {
    #[error("collected amount cannot be negative ({0})")]
    NegativeAmount(Amount),

    #[error("allocation for project {project_id} cannot be negative ({amount})")]
    NegativeAllocation { project_id: i64, amount: Amount },

    #[error("project {0} appears more than once in the allocation list")]
    DuplicateAllocation(i64),

    #[error("project {0} does not exist")]
    UnknownProject(i64),

    #[error("project {0} is not active")]
    ProjectNotActive(i64),

    #[error("allocated {requested} exceeds the {available} available")]
    OverAllocation { requested: Amount, available: Amount },

    #[error("amounts are too large to add up")]
    AmountOverflow,

    #[error("nothing to distribute: enter a collected amount or an allocation")]
    NothingToDistribute,
}
