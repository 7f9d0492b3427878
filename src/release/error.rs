// ABOUTME: Error types for planning and locking release batches.
// ABOUTME: Batch-fatal errors are separate from per-service planning problems.

use std::path::PathBuf;

use crate::backend::{LockError, StoreError};
use crate::model::{CloudProvider, EnvironmentStatus, ServiceProduct, ServiceStatus};
use crate::types::{EnvironmentName, ServiceName};

/// Planning errors that abort the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("environment `{environment}` is not ready (status {status})")]
    EnvironmentNotReady {
        environment: EnvironmentName,
        status: EnvironmentStatus,
    },

    #[error("cannot promote `{0}` to itself")]
    SameEnvironment(EnvironmentName),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A problem with one service; that service is dropped and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServicePlanError {
    #[error("service `{service}` exists as {existing}, not {requested}")]
    ServiceProductMismatch {
        service: ServiceName,
        existing: ServiceProduct,
        requested: ServiceProduct,
    },

    #[error("service `{service}` has a release in progress ({status})")]
    ServiceIsPending {
        service: ServiceName,
        status: ServiceStatus,
    },

    #[error("build directory for `{service}` not found: {}", path.display())]
    BuildDirectoryNotFound { service: ServiceName, path: PathBuf },

    #[error("dockerfile for `{service}` not found: {}", path.display())]
    DockerfileNotFound { service: ServiceName, path: PathBuf },

    #[error("environment `{environment}` has no {provider} configuration for `{service}`")]
    ProviderNotConfigured {
        service: ServiceName,
        environment: EnvironmentName,
        provider: CloudProvider,
    },

    #[error("service `{service}` does not exist in source environment `{environment}`")]
    SourceServiceNotFound {
        service: ServiceName,
        environment: EnvironmentName,
    },

    #[error("service `{service}` in `{environment}` is {status}, not READY")]
    ServiceNotReady {
        service: ServiceName,
        environment: EnvironmentName,
        status: ServiceStatus,
    },

    #[error("service `{service}` in `{environment}` has no image to promote")]
    SourceImageMissing {
        service: ServiceName,
        environment: EnvironmentName,
    },

    #[error("service `{0}` is listed more than once")]
    DuplicateService(ServiceName),
}

impl ServicePlanError {
    pub fn service(&self) -> &ServiceName {
        match self {
            ServicePlanError::ServiceProductMismatch { service, .. }
            | ServicePlanError::ServiceIsPending { service, .. }
            | ServicePlanError::BuildDirectoryNotFound { service, .. }
            | ServicePlanError::DockerfileNotFound { service, .. }
            | ServicePlanError::ProviderNotConfigured { service, .. }
            | ServicePlanError::SourceServiceNotFound { service, .. }
            | ServicePlanError::ServiceNotReady { service, .. }
            | ServicePlanError::SourceImageMissing { service, .. }
            | ServicePlanError::DuplicateService(service) => service,
        }
    }
}

/// Errors that abort a batch between selection and execution.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("could not lock environment `{environment}`: {source}")]
    EnvironmentLock {
        environment: EnvironmentName,
        #[source]
        source: LockError,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
