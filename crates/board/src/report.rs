//! The uniform record returned by every successful reconciliation run.

use serde::{Deserialize, Serialize};

use crate::{AnalysisRecord, BoardHandle, OptimizationAction, ReconciliationRunId, WipLimitMap};

/// Which branch of the reconciliation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// A new board was provisioned.
    Created,
    /// An existing board was adjusted.
    Optimized,
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub run_id: ReconciliationRunId,
    pub action: ReconcileAction,
    pub board: BoardHandle,
    pub analysis: AnalysisRecord,
    pub wip_limits: WipLimitMap,
    /// Actions attempted against an existing board, each with its outcome.
    /// Empty for newly created boards.
    pub optimizations: Vec<OptimizationAction>,
}

impl ReconciliationResult {
    /// Number of optimization actions that were applied.
    pub fn applied_count(&self) -> usize {
        self.optimizations.iter().filter(|a| a.is_applied()).count()
    }
}
