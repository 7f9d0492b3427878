// ABOUTME: Drives one locked plan through the release state machine.
// ABOUTME: Writes the in-flight state, runs the workflow, then persists READY or rolls back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::backend::{ReleaseReason, StateStore, StoreError};
use crate::model::{ProviderOutputs, ReleaseKind, ServiceState, ServiceStatus};
use crate::types::{DeploymentId, EnvironmentName, LockId, ServiceName};
use crate::workflow::{WorkflowError, WorkflowRegistry};

use super::lock::{LockHandle, LockedPlan};
use super::plan::ReleasePlan;

/// Result of one executed plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    pub service_ref: String,
    pub environment: EnvironmentName,
    pub kind: ReleaseKind,
    pub deployment_id: DeploymentId,
    pub success: bool,
    /// Final persisted state.
    pub state: ServiceState,
    /// Workflow error message when the release failed.
    pub error: Option<String>,
    /// Captured workflow output for this release.
    pub log_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct ReleaseExecutor {
    store: Arc<dyn StateStore>,
    workflows: WorkflowRegistry,
    log_dir: Option<PathBuf>,
}

impl ReleaseExecutor {
    pub fn new(store: Arc<dyn StateStore>, workflows: WorkflowRegistry) -> Self {
        Self {
            store,
            workflows,
            log_dir: None,
        }
    }

    /// Capture workflow output to `<dir>/<environment>/logs/<service>-<deployment>.log`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Execute a locked plan and release its lock as `Completed`.
    ///
    /// Workflow failures are a failed outcome; only persistence errors are `Err`.
    /// The lock is released on both paths.
    pub async fn execute(&self, locked: LockedPlan) -> Result<ReleaseOutcome, StoreError> {
        let LockedPlan { plan, lock } = locked;
        let span = tracing::info_span!(
            "release",
            service = %plan.service(),
            environment = %plan.target_environment(),
            operation = %plan.kind(),
        );

        async move {
            let result = self.run(&plan, &lock).await;
            if let Err(e) = &result {
                tracing::error!("failed to persist {}: {}", plan.service_ref(), e);
            }
            lock.release_or_warn(ReleaseReason::Completed).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, plan: &ReleasePlan, lock: &LockHandle) -> Result<ReleaseOutcome, StoreError> {
        let environment = plan.target_environment();
        let kind = plan.kind();
        let deployment_id = DeploymentId::generate();
        let log_file = self
            .prepare_log(environment, plan.service(), &deployment_id)
            .await;

        let in_flight =
            ServiceState::in_flight(plan.definition(), kind, plan.snapshot(), Utc::now());
        self.store
            .save_service(environment, &in_flight, lock.id())
            .await?;
        tracing::info!(
            "{} of {} started (deployment {})",
            kind,
            plan.service_ref(),
            deployment_id
        );

        let invoked = self
            .invoke(plan, lock.id(), &deployment_id, log_file.clone())
            .await;
        let (state, error) = match invoked {
            Ok(outputs) => {
                tracing::info!(
                    "{} of {} succeeded: {}",
                    kind,
                    plan.service_ref(),
                    outputs.image_ref
                );
                (in_flight.released(outputs, Utc::now()), None)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    deployment_id = %deployment_id,
                    "{} of {} failed",
                    kind,
                    plan.service_ref()
                );
                if let Some(path) = &log_file {
                    append_error(path, kind, &e).await;
                }
                (
                    in_flight.rolled_back(plan.snapshot(), kind, Utc::now()),
                    Some(e.to_string()),
                )
            }
        };
        self.store.save_service(environment, &state, lock.id()).await?;

        Ok(ReleaseOutcome {
            service_ref: plan.service_ref(),
            environment: environment.clone(),
            kind,
            deployment_id,
            success: state.status == ServiceStatus::Ready,
            state,
            error,
            log_file,
        })
    }

    async fn prepare_log(
        &self,
        environment: &EnvironmentName,
        service: &ServiceName,
        deployment_id: &DeploymentId,
    ) -> Option<PathBuf> {
        let dir = self.log_dir.as_ref()?.join(environment.as_str()).join("logs");
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!("not capturing workflow output in {}: {}", dir.display(), e);
            return None;
        }
        Some(dir.join(format!("{}-{}.log", service, deployment_id)))
    }

    async fn invoke(
        &self,
        plan: &ReleasePlan,
        lock_id: &LockId,
        deployment_id: &DeploymentId,
        log_file: Option<PathBuf>,
    ) -> Result<ProviderOutputs, WorkflowError> {
        let workflow = self.workflows.for_product(plan.definition().product);
        match plan {
            ReleasePlan::Deploy(plan) => {
                let mut inputs = plan.inputs(lock_id, deployment_id);
                inputs.log_file = log_file;
                workflow.deploy(&inputs).await
            }
            ReleasePlan::Promote(plan) => {
                let mut inputs = plan.inputs(lock_id, deployment_id);
                inputs.log_file = log_file;
                workflow.promote(&inputs).await
            }
        }
    }
}

/// Record the workflow error at the end of the release log.
async fn append_error(path: &Path, kind: ReleaseKind, error: &WorkflowError) {
    let line = format!("{} failed: {}\n", kind, error);
    let written = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
    .await;
    if let Err(e) = written {
        tracing::warn!("failed to write workflow log {}: {}", path.display(), e);
    }
}
