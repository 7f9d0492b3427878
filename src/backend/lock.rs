// ABOUTME: Lock keys, holder info and release records shared by all lock backends.
// ABOUTME: Holder info carries the operation metadata (the rendered plan) for auditing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::LockError;
use crate::types::{EnvironmentName, LockId, ServiceName};

/// What a lock protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Coarse lock held briefly while plans are validated.
    Environment(EnvironmentName),
    /// Fine lock held for the whole release of one service.
    Service(EnvironmentName, ServiceName),
}

impl LockKey {
    pub fn environment(&self) -> &EnvironmentName {
        match self {
            LockKey::Environment(env) | LockKey::Service(env, _) => env,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Environment(env) => write!(f, "environment `{}`", env),
            LockKey::Service(env, service) => write!(f, "service `{}/{}`", env, service),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    LockEnvironment,
    DeployService,
    PromoteService,
}

/// The operation a lock is taken for, recorded with the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOperation {
    pub operation_type: OperationType,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LockOperation {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Information about who holds a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub lock_id: LockId,
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub operation: LockOperation,
}

impl LockInfo {
    /// Holder info for the current process with a fresh lock id.
    pub fn new(operation: LockOperation) -> Self {
        Self {
            lock_id: LockId::generate(),
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            operation,
        }
    }

    /// Error reported when this holder blocks an acquisition.
    pub(crate) fn contention(&self, key: &LockKey, waited: Duration) -> LockError {
        if waited.is_zero() {
            LockError::Held {
                key: key.to_string(),
                holder: self.holder.clone(),
                pid: self.pid,
                acquired_at: self.acquired_at,
            }
        } else {
            LockError::Timeout {
                key: key.to_string(),
                waited,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    /// The operation ran to completion, successfully or not.
    Completed,
    /// The operation was never started.
    Abandoned,
}

/// Audit record written when a lock is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRelease {
    pub key: String,
    pub lock_id: LockId,
    pub operation: LockOperation,
    pub reason: ReleaseReason,
    pub released_at: DateTime<Utc>,
}
