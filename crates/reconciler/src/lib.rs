//! Kanban tuner orchestration.
//!
//! This crate sequences calls between the business logic in the [`board`]
//! crate and a [`board::RepositoryService`] implementation:
//!
//! - [`MetricsCollector`] fetches contributors, issues and pull requests
//!   concurrently, retrying each signal independently.
//! - [`BoardReconciler`] runs the reconciliation state machine: analyse the
//!   repository, locate an existing board, then create or optimize.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nothing here knows about HTTP or GraphQL, and no
//! domain rule lives here that is not already defined in [`board`].

pub mod collector;
pub mod reconciler;

pub use collector::{MetricsCollector, RepositorySignals, RetrySettings};
pub use reconciler::{BoardReconciler, ReconcilePhase, ReconcileRequest};
