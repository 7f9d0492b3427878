// ABOUTME: Provider workflow capability and per-product dispatch.
// ABOUTME: One workflow per product; the registry matches on the closed product enum.

mod script;

pub use script::ScriptWorkflow;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::model::{ProviderOutputs, ServiceProduct};
use crate::types::{DeploymentId, EnvironmentName, LockId, ServiceName};

/// Inputs for building and releasing a service from source.
#[derive(Debug, Clone, Serialize)]
pub struct DeployInputs {
    pub deployment_id: DeploymentId,
    pub lock_id: LockId,
    pub environment: EnvironmentName,
    pub service: ServiceName,
    pub product: ServiceProduct,
    /// Absolute source directory.
    pub source_dir: PathBuf,
    pub dockerfile: String,
    pub region: Option<String>,
    pub artifact_bucket: Option<String>,
    pub args: BTreeMap<String, Value>,
    /// File the workflow appends its output to.
    pub log_file: Option<PathBuf>,
}

/// Inputs for releasing an image already built in another environment.
#[derive(Debug, Clone, Serialize)]
pub struct PromoteInputs {
    pub deployment_id: DeploymentId,
    pub lock_id: LockId,
    pub from_environment: EnvironmentName,
    pub to_environment: EnvironmentName,
    pub service: ServiceName,
    pub product: ServiceProduct,
    /// Image reference of the READY service in the source environment.
    pub source_image: String,
    pub source_region: Option<String>,
    pub region: Option<String>,
    pub artifact_bucket: Option<String>,
    pub args: BTreeMap<String, Value>,
    /// File the workflow appends its output to.
    pub log_file: Option<PathBuf>,
}

/// Performs the actual release for one product.
///
/// Calls may run for a long time and are never cancelled by the caller.
#[async_trait]
pub trait ProviderWorkflow: Send + Sync {
    async fn deploy(&self, inputs: &DeployInputs) -> Result<ProviderOutputs, WorkflowError>;

    async fn promote(&self, inputs: &PromoteInputs) -> Result<ProviderOutputs, WorkflowError>;
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow script not found: {}", .0.display())]
    MissingScript(PathBuf),

    #[error("failed to run workflow {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workflow exited with {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("workflow produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    Failed(String),
}

/// Workflow per product.
#[derive(Clone)]
pub struct WorkflowRegistry {
    cloud_run: Arc<dyn ProviderWorkflow>,
    ecs_fargate: Arc<dyn ProviderWorkflow>,
}

impl WorkflowRegistry {
    pub fn new(
        cloud_run: Arc<dyn ProviderWorkflow>,
        ecs_fargate: Arc<dyn ProviderWorkflow>,
    ) -> Self {
        Self {
            cloud_run,
            ecs_fargate,
        }
    }

    /// Use the same workflow for every product.
    pub fn uniform(workflow: Arc<dyn ProviderWorkflow>) -> Self {
        Self::new(Arc::clone(&workflow), workflow)
    }

    /// Script workflows at `<dir>/<product>`, e.g. `.shipwright/workflows/gcp-cloud-run`.
    pub fn from_directory(dir: &Path) -> Self {
        let script = |product: ServiceProduct| -> Arc<dyn ProviderWorkflow> {
            Arc::new(ScriptWorkflow::new(dir.join(product.as_str())))
        };
        Self::new(
            script(ServiceProduct::GcpCloudRun),
            script(ServiceProduct::AwsEcsFargate),
        )
    }

    pub fn for_product(&self, product: ServiceProduct) -> &dyn ProviderWorkflow {
        match product {
            ServiceProduct::GcpCloudRun => self.cloud_run.as_ref(),
            ServiceProduct::AwsEcsFargate => self.ecs_fargate.as_ref(),
        }
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry").finish_non_exhaustive()
    }
}
