// ABOUTME: Error types for state storage and locking.
// ABOUTME: Store errors are fatal to a batch; lock contention is reported separately.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{EnvironmentName, ServiceName};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("environment not found: {0}")]
    EnvironmentNotFound(EnvironmentName),

    #[error("service `{service}` not found in environment `{environment}`")]
    ServiceNotFound {
        environment: EnvironmentName,
        service: ServiceName,
    },

    #[error("write to {key} rejected: lock {lock_id} is not the current holder")]
    LockMismatch { key: String, lock_id: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to verify lock: {0}")]
    Lock(#[from] LockError),
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{key} is locked by {holder} (pid {pid}) since {acquired_at}")]
    Held {
        key: String,
        holder: String,
        pid: u32,
        acquired_at: DateTime<Utc>,
    },

    #[error("timed out after {waited:?} waiting for lock on {key}")]
    Timeout { key: String, waited: Duration },

    #[error("lock {lock_id} does not hold {key}")]
    NotHolder { key: String, lock_id: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt lock file at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A lock file exists but its holder cannot be read. Remove it by hand
    /// once nothing is releasing.
    #[error("{key} is locked by an unreadable lock file at {}", path.display())]
    Unreadable { key: String, path: PathBuf },
}

impl LockError {
    /// The lock is held by someone else (immediately or after waiting).
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            LockError::Held { .. } | LockError::Timeout { .. } | LockError::Unreadable { .. }
        )
    }
}
