// ABOUTME: Wires planning, selection, locking and execution into deploy and promote.
// ABOUTME: Unified error type with SNAFU and a kind() accessor for callers.

use std::path::PathBuf;
use std::sync::Arc;

use snafu::{ResultExt, Snafu};

use crate::backend::{LockBackend, StateStore, StoreError};
use crate::diagnostics::{Diagnostics, Warning};
use crate::model::{ReleaseKind, ServiceDefinition};
use crate::release::{
    AbandonedPlan, BatchSummary, LockCoordinator, LockSettings, PlanBatch, PlanBuilder, PlanError,
    PlanPresenter, ReleaseError, ReleaseExecutor, SelectionContext, ServicePlanError, run_all,
};
use crate::types::EnvironmentName;
use crate::workflow::WorkflowRegistry;

/// Errors that abort a whole batch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OrchestratorError {
    #[snafu(display("planning failed: {source}"))]
    Planning { source: PlanError },

    #[snafu(display("plan selection failed: {source}"))]
    Selection { source: std::io::Error },

    #[snafu(display("locking failed: {source}"))]
    Locking { source: ReleaseError },

    #[snafu(display("release failed: {source}"))]
    Execution { source: StoreError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorErrorKind {
    EnvironmentNotFound,
    EnvironmentNotReady,
    SameEnvironment,
    /// Another batch held the environment lock past the wait.
    EnvironmentBusy,
    Lock,
    Persistence,
    Selection,
}

impl OrchestratorError {
    pub fn kind(&self) -> OrchestratorErrorKind {
        match self {
            OrchestratorError::Planning { source } => match source {
                PlanError::EnvironmentNotReady { .. } => OrchestratorErrorKind::EnvironmentNotReady,
                PlanError::SameEnvironment(_) => OrchestratorErrorKind::SameEnvironment,
                PlanError::Store(StoreError::EnvironmentNotFound(_)) => {
                    OrchestratorErrorKind::EnvironmentNotFound
                }
                PlanError::Store(_) => OrchestratorErrorKind::Persistence,
            },
            OrchestratorError::Selection { .. } => OrchestratorErrorKind::Selection,
            OrchestratorError::Locking { source } => match source {
                ReleaseError::EnvironmentLock { source, .. } if source.is_contention() => {
                    OrchestratorErrorKind::EnvironmentBusy
                }
                ReleaseError::EnvironmentLock { .. } | ReleaseError::Lock(_) => {
                    OrchestratorErrorKind::Lock
                }
                ReleaseError::Store(_) => OrchestratorErrorKind::Persistence,
            },
            OrchestratorError::Execution { .. } => OrchestratorErrorKind::Persistence,
        }
    }
}

/// Everything that happened to one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub planning_failures: Vec<ServicePlanError>,
    /// Plans planned but not chosen by the presenter.
    pub unselected: usize,
    pub abandoned: Vec<AbandonedPlan>,
    pub summary: BatchSummary,
    pub diagnostics: Diagnostics,
}

impl BatchReport {
    /// True when no executed release failed.
    ///
    /// Skipped and abandoned services do not make a batch unsuccessful.
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

pub struct Orchestrator {
    planner: PlanBuilder,
    coordinator: LockCoordinator,
    executor: Arc<ReleaseExecutor>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        locks: Arc<dyn LockBackend>,
        workflows: WorkflowRegistry,
        project_root: impl Into<PathBuf>,
        settings: LockSettings,
    ) -> Self {
        Self {
            planner: PlanBuilder::new(Arc::clone(&store), project_root),
            coordinator: LockCoordinator::new(locks, Arc::clone(&store), settings),
            executor: Arc::new(ReleaseExecutor::new(store, workflows)),
        }
    }

    /// Use one backend for both state and locks.
    pub fn with_backend<B>(
        backend: Arc<B>,
        workflows: WorkflowRegistry,
        project_root: impl Into<PathBuf>,
        settings: LockSettings,
    ) -> Self
    where
        B: StateStore + LockBackend + 'static,
    {
        Self::new(
            backend.clone(),
            backend,
            workflows,
            project_root,
            settings,
        )
    }

    /// Capture each release's workflow output in a log file under `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let executor = (*self.executor).clone().with_log_dir(dir);
        self.executor = Arc::new(executor);
        self
    }

    /// Deploy `definitions` to `environment`.
    pub async fn deploy(
        &self,
        definitions: &[ServiceDefinition],
        environment: &EnvironmentName,
        presenter: &mut dyn PlanPresenter,
    ) -> Result<BatchReport, OrchestratorError> {
        let batch = self
            .planner
            .plan_deploy(definitions, environment)
            .await
            .context(PlanningSnafu)?;
        let context = SelectionContext {
            kind: ReleaseKind::Deploy,
            from: None,
            to: environment,
        };
        self.release(batch, &context, presenter).await
    }

    /// Promote the READY images of `definitions` from `from` to `to`.
    pub async fn promote(
        &self,
        definitions: &[ServiceDefinition],
        from: &EnvironmentName,
        to: &EnvironmentName,
        presenter: &mut dyn PlanPresenter,
    ) -> Result<BatchReport, OrchestratorError> {
        let batch = self
            .planner
            .plan_promote(definitions, from, to)
            .await
            .context(PlanningSnafu)?;
        let context = SelectionContext {
            kind: ReleaseKind::Promote,
            from: Some(from),
            to,
        };
        self.release(batch, &context, presenter).await
    }

    async fn release(
        &self,
        batch: PlanBatch,
        context: &SelectionContext<'_>,
        presenter: &mut dyn PlanPresenter,
    ) -> Result<BatchReport, OrchestratorError> {
        let mut report = BatchReport::default();
        for failure in &batch.failures {
            report
                .diagnostics
                .warn(Warning::plan_skipped(failure.to_string()));
        }
        report.planning_failures = batch.failures;

        if batch.plans.is_empty() {
            tracing::info!("no services to {}", context.kind);
            return Ok(report);
        }

        let planned = batch.plans.len();
        let selected = presenter
            .select(batch.plans, context)
            .context(SelectionSnafu)?;
        report.unselected = planned - selected.len();
        if selected.is_empty() {
            tracing::info!("no services selected");
            return Ok(report);
        }

        let outcome = self
            .coordinator
            .lock_valid_plans(selected, context.to)
            .await
            .context(LockingSnafu)?;
        for abandoned in &outcome.abandoned {
            report.diagnostics.warn(Warning::plan_abandoned(format!(
                "{} was not released: {}",
                abandoned.service_ref, abandoned.reason
            )));
        }
        report.abandoned = outcome.abandoned;

        report.summary = run_all(Arc::clone(&self.executor), outcome.locked)
            .await
            .context(ExecutionSnafu)?;
        for failed in report.summary.outcomes.iter().filter(|o| !o.success) {
            report.diagnostics.warn(Warning::release_failed(format!(
                "{} of {} failed: {}",
                failed.kind,
                failed.service_ref,
                failed.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::info!(
            "{} succeeded, {} failed",
            report.summary.success_count(),
            report.summary.failure_count()
        );
        Ok(report)
    }
}
