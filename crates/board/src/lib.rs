//! Core domain for the Kanban tuner.
//!
//! This crate contains every domain concept used to reconcile a project board
//! with a repository's activity: identifiers, value types, the activity
//! analyzer, the WIP-limit formula language, templates, the optimization
//! planner and the port trait infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `BoardId`, `ColumnPurpose`, etc.) |
//! | [`types`] | Value types (`TeamSize`, `WipLimit`, `WipLimitMap`, activity signals) |
//! | [`structure`] | Board structure (`BoardHandle`, fields, views) and `FieldSpec` |
//! | [`analysis`] | `AnalysisRecord` and the activity analyzer |
//! | [`formula`] | Whitelisted arithmetic formula parser/evaluator |
//! | [`template`] | `BoardTemplate`, `ColumnSpec`, preset tables, validation |
//! | [`limits`] | WIP-limit computation with clamp and preset fallback |
//! | [`optimization`] | Board-vs-template diffing and per-action outcomes |
//! | [`ports`] | `RepositoryService` trait and `ServiceError` |
//! | [`report`] | `ReconciliationResult` |
//! | [`errors`] | Run-level error and retry-policy types |

pub mod analysis;
pub mod errors;
pub mod formula;
pub mod identifiers;
pub mod limits;
pub mod optimization;
pub mod ports;
pub mod report;
pub mod structure;
pub mod template;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use analysis::{analyze, AnalysisRecord};
pub use errors::{BoardError, RetryPolicy};
pub use formula::{Formula, FormulaError};
pub use identifiers::{
    BoardId, BoardNumber, ColumnPurpose, ContributorLogin, FieldId, IssueNumber, OptionId,
    PullRequestNumber, ReconciliationRunId, RepositoryId, ViewId,
};
pub use limits::{compute_limits, LimitSource};
pub use optimization::{plan_optimizations, ActionOutcome, OptimizationAction, OptimizationKind};
pub use ports::{RepositoryService, ServiceError};
pub use report::{ReconcileAction, ReconciliationResult};
pub use structure::{
    BoardBlueprint, BoardField, BoardHandle, BoardView, FieldDataType, FieldKind, FieldOption,
    FieldOptionSpec, FieldSpec, OptionColor, ViewLayout,
};
pub use template::{BoardTemplate, ColumnSpec, TemplateError, WipPresets};
pub use types::{
    ActivityWindow, ContributorStat, Issue, PullRequest, TeamSize, Timestamp, WipLimit,
    WipLimitMap,
};
