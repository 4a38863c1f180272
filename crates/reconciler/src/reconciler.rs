//! The reconciliation state machine.
//!
//! ```text
//! Start → Analyzing → LocatingBoard → Creating   → Done
//!                                   ↘ Optimizing ↗
//! ```
//!
//! Failures while analysing or locating degrade (default analysis, "no board");
//! failures while creating a board are fatal; failures of individual
//! optimization actions are recorded on the action and skipped.

use std::sync::Arc;
use std::time::Duration;

use board::optimization::{missing_custom_fields, plan_column_changes, stage_field_spec};
use board::{
    analyze, compute_limits, plan_optimizations, ActionOutcome, AnalysisRecord, BoardBlueprint,
    BoardError, BoardHandle, BoardTemplate, OptimizationAction, ReconcileAction,
    ReconciliationResult, ReconciliationRunId, RepositoryId, RepositoryService, ServiceError,
    TeamSize, WipLimitMap,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::collector::{MetricsCollector, RetrySettings};

/// Phases of a reconciliation run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    Start,
    Analyzing,
    LocatingBoard,
    Creating,
    Optimizing,
    Done,
}

impl ReconcilePhase {
    /// Branch taken after the board lookup: a new board is created when none
    /// exists or when creation is forced.
    pub fn after_lookup(existing: Option<&BoardHandle>, force_setup: bool) -> Self {
        match existing {
            Some(_) if !force_setup => ReconcilePhase::Optimizing,
            _ => ReconcilePhase::Creating,
        }
    }
}

impl std::fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReconcilePhase::Start => "start",
            ReconcilePhase::Analyzing => "analyzing",
            ReconcilePhase::LocatingBoard => "locating_board",
            ReconcilePhase::Creating => "creating",
            ReconcilePhase::Optimizing => "optimizing",
            ReconcilePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Inputs of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub repo: RepositoryId,
    /// Always create a new board, even if one exists.
    pub force_setup: bool,
    /// Replaces the team-size class derived from the contributor count.
    pub team_size_override: Option<TeamSize>,
}

impl ReconcileRequest {
    /// Request with no force flag and no override.
    pub fn new(repo: RepositoryId) -> Self {
        Self {
            repo,
            force_setup: false,
            team_size_override: None,
        }
    }
}

/// Creates or optimizes the board of a repository.
pub struct BoardReconciler {
    service: Arc<dyn RepositoryService>,
    collector: MetricsCollector,
    template: BoardTemplate,
    deadline: Option<Duration>,
}

impl BoardReconciler {
    /// Builds a reconciler, rejecting templates that fail validation.
    pub fn new(
        service: Arc<dyn RepositoryService>,
        template: BoardTemplate,
    ) -> Result<Self, BoardError> {
        template.validate()?;
        Ok(Self {
            collector: MetricsCollector::new(Arc::clone(&service)),
            service,
            template,
            deadline: None,
        })
    }

    /// Bounds the whole run; in-flight calls are dropped when it expires.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the retry settings of the metrics collector.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.collector = self.collector.with_retry(retry);
        self
    }

    /// The template driving this reconciler.
    pub fn template(&self) -> &BoardTemplate {
        &self.template
    }

    /// Runs one reconciliation.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<ReconciliationResult, BoardError> {
        let run_id = ReconciliationRunId::new_random();
        let span = info_span!(
            "reconcile",
            %run_id,
            repo = %request.repo,
            force_setup = request.force_setup
        );

        let run = self.run(run_id, request).instrument(span);
        match self.deadline {
            Some(after) => tokio::time::timeout(after, run)
                .await
                .map_err(|_| BoardError::DeadlineExceeded { after })?,
            None => run.await,
        }
    }

    async fn run(
        &self,
        run_id: ReconciliationRunId,
        request: &ReconcileRequest,
    ) -> Result<ReconciliationResult, BoardError> {
        enter(ReconcilePhase::Start);

        enter(ReconcilePhase::Analyzing);
        let analysis = self.analyze(request).await;

        enter(ReconcilePhase::LocatingBoard);
        let existing = self.locate_board(&request.repo).await;

        let limits = compute_limits(&self.template.columns, &self.template.wip_presets, &analysis)?;
        info!(limits = ?limits, "computed WIP limits");

        let phase = ReconcilePhase::after_lookup(existing.as_ref(), request.force_setup);
        enter(phase);

        let result = match existing {
            Some(board) if phase == ReconcilePhase::Optimizing => {
                let (board, optimizations) = self.optimize(board, &limits).await;
                ReconciliationResult {
                    run_id,
                    action: ReconcileAction::Optimized,
                    board,
                    analysis,
                    wip_limits: limits,
                    optimizations,
                }
            }
            _ => {
                let board = self.create(&request.repo, &limits).await?;
                ReconciliationResult {
                    run_id,
                    action: ReconcileAction::Created,
                    board,
                    analysis,
                    wip_limits: limits,
                    optimizations: Vec::new(),
                }
            }
        };

        enter(ReconcilePhase::Done);
        info!(
            action = ?result.action,
            board = %result.board.url,
            applied = result.applied_count(),
            attempted = result.optimizations.len(),
            "reconciliation finished"
        );
        Ok(result)
    }

    /// Collects and analyses activity. Never fails: a collection error yields
    /// the degraded record.
    async fn analyze(&self, request: &ReconcileRequest) -> AnalysisRecord {
        let analysis = match self.collector.collect(&request.repo).await {
            Ok(signals) => analyze(
                &signals.contributors,
                &signals.window.issues,
                &signals.window.pull_requests,
            ),
            Err(error) => {
                warn!(%error, "could not collect repository activity; using default analysis");
                AnalysisRecord::degraded()
            }
        };

        let analysis = match request.team_size_override {
            Some(team_size) => {
                if team_size != analysis.team_size {
                    info!(derived = %analysis.team_size, %team_size, "team size overridden");
                }
                analysis.with_team_size(team_size)
            }
            None => analysis,
        };

        info!(
            contributors = analysis.contributor_count,
            active_contributors = analysis.active_contributor_count,
            issue_velocity = analysis.issue_velocity,
            pr_frequency = analysis.pr_frequency,
            avg_review_time_days = analysis.avg_review_time_days,
            team_size = %analysis.team_size,
            degraded = analysis.degraded,
            "repository analysed"
        );
        analysis
    }

    /// First non-closed board in the service's order. A failed lookup counts
    /// as "no board".
    async fn locate_board(&self, repo: &RepositoryId) -> Option<BoardHandle> {
        let boards = match self.service.find_active_boards(repo).await {
            Ok(boards) => boards,
            Err(error) => {
                warn!(%error, "board lookup failed; treating as no existing board");
                return None;
            }
        };

        let mut active = boards.into_iter().filter(|b| !b.closed);
        let board = active.next()?;
        let others = active.count();
        if others > 0 {
            info!(others, board = %board.title, "several active boards found; using the first");
        } else {
            info!(board = %board.title, url = %board.url, "found existing board");
        }
        Some(board)
    }

    /// Provisions a new board. Every step must succeed.
    async fn create(
        &self,
        repo: &RepositoryId,
        limits: &WipLimitMap,
    ) -> Result<BoardHandle, BoardError> {
        let blueprint = BoardBlueprint {
            title: self.template.name.clone(),
            description: self.template.description.clone(),
        };
        let mut board = self
            .service
            .create_board(repo, &blueprint)
            .await
            .map_err(creation_failed("creating the board"))?;
        info!(board = %board.id, url = %board.url, "created board");

        for spec in missing_custom_fields(&board, &self.template) {
            let field_id = self
                .service
                .add_field(&board.id, &spec)
                .await
                .map_err(creation_failed(format!("adding field '{}'", spec.name)))?;
            debug!(field = %spec.name, %field_id, "added custom field");
            board.fields.push(spec.into_board_field(field_id));
        }

        match plan_column_changes(&board, &self.template, limits) {
            None => {
                let spec = stage_field_spec(&self.template, limits);
                let field_id = self
                    .service
                    .add_field(&board.id, &spec)
                    .await
                    .map_err(creation_failed(format!("adding stage field '{}'", spec.name)))?;
                debug!(
                    field = %spec.name,
                    %field_id,
                    columns = spec.options.len(),
                    "added stage field"
                );
                board.fields.push(spec.into_board_field(field_id));
            }
            Some(changes) => {
                for change in changes {
                    self.service
                        .apply_optimization(&board.id, &change)
                        .await
                        .map_err(creation_failed(change.label()))?;
                    debug!(change = %change.label(), "configured column");
                }
                board = self.refresh(board).await;
            }
        }

        debug!("board automations are not exposed by the service API; skipping");
        Ok(board)
    }

    /// Applies every planned change to an existing board, recording a
    /// per-action outcome instead of failing.
    async fn optimize(
        &self,
        board: BoardHandle,
        limits: &WipLimitMap,
    ) -> (BoardHandle, Vec<OptimizationAction>) {
        let board = self.refresh(board).await;
        let mut actions = plan_optimizations(&board, &self.template, limits);
        info!(planned = actions.len(), "planned board optimizations");

        for action in &mut actions {
            let label = action.kind.label();
            action.outcome = match self.service.apply_optimization(&board.id, &action.kind).await {
                Ok(()) => {
                    info!(change = %label, "applied optimization");
                    ActionOutcome::Applied
                }
                Err(error) => {
                    warn!(change = %label, %error, "optimization failed; skipping");
                    ActionOutcome::Skipped {
                        reason: error.to_string(),
                    }
                }
            };
        }

        (board, actions)
    }

    /// Re-reads the board structure, keeping the stale handle on failure.
    async fn refresh(&self, board: BoardHandle) -> BoardHandle {
        match self.service.describe_board(&board.id).await {
            Ok(current) => current,
            Err(error) => {
                warn!(
                    board = %board.id,
                    %error,
                    "could not refresh board structure; using last known"
                );
                board
            }
        }
    }
}

fn enter(phase: ReconcilePhase) {
    debug!(%phase, "entering phase");
}

fn creation_failed(step: impl Into<String>) -> impl FnOnce(ServiceError) -> BoardError {
    let step = step.into();
    move |source| BoardError::Creation { step, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board::BoardId;

    fn board() -> BoardHandle {
        BoardHandle {
            id: BoardId::new("PVT_1").unwrap(),
            number: None,
            title: "Flow".into(),
            short_description: None,
            url: "https://example.test/p/1".into(),
            closed: false,
            fields: vec![],
            views: vec![],
        }
    }

    #[test]
    fn lookup_decides_the_branch() {
        let existing = board();
        assert_eq!(ReconcilePhase::after_lookup(None, false), ReconcilePhase::Creating);
        assert_eq!(ReconcilePhase::after_lookup(None, true), ReconcilePhase::Creating);
        assert_eq!(
            ReconcilePhase::after_lookup(Some(&existing), false),
            ReconcilePhase::Optimizing
        );
        assert_eq!(
            ReconcilePhase::after_lookup(Some(&existing), true),
            ReconcilePhase::Creating
        );
    }
}
