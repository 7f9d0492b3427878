// ABOUTME: Application-wide error types for the shipwright CLI.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::StoreError;
use crate::model::ReleaseKind;
use crate::orchestrator::OrchestratorError;
use crate::types::{EnvironmentName, NameError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("environment already exists: {0}")]
    EnvironmentExists(EnvironmentName),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("failed to {kind} {failed} services")]
    ReleaseFailed { kind: ReleaseKind, failed: usize },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
