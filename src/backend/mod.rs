// ABOUTME: Persisted-state and lock backends consumed by the release core.
// ABOUTME: Defines the StateStore and LockBackend traits plus in-memory and local implementations.

mod error;
mod local;
mod lock;
mod memory;

pub use error::{LockError, StoreError};
pub use local::LocalBackend;
pub use lock::{LockInfo, LockKey, LockOperation, LockRelease, OperationType, ReleaseReason};
pub use memory::MemoryBackend;

use std::time::Duration;

use async_trait::async_trait;

use crate::model::{EnvironmentState, ServiceState};
use crate::types::{EnvironmentName, LockId, ServiceName};

/// Storage for environment and service records.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_environment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<EnvironmentState, StoreError>;

    async fn save_environment(&self, state: &EnvironmentState) -> Result<(), StoreError>;

    /// Returns `StoreError::ServiceNotFound` when the service was never released.
    async fn load_service(
        &self,
        environment: &EnvironmentName,
        service: &ServiceName,
    ) -> Result<ServiceState, StoreError>;

    /// Persist a service record.
    ///
    /// Rejected with `StoreError::LockMismatch` unless `lock_id` currently
    /// holds the service's lock.
    async fn save_service(
        &self,
        environment: &EnvironmentName,
        state: &ServiceState,
        lock_id: &LockId,
    ) -> Result<(), StoreError>;

    async fn list_services(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<ServiceState>, StoreError>;

    /// Like `load_service`, with a missing record mapped to `None`.
    async fn find_service(
        &self,
        environment: &EnvironmentName,
        service: &ServiceName,
    ) -> Result<Option<ServiceState>, StoreError> {
        match self.load_service(environment, service).await {
            Ok(state) => Ok(Some(state)),
            Err(StoreError::ServiceNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Mutual exclusion over environments and services.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Acquire `key`, waiting at most `wait` for the current holder.
    ///
    /// A zero `wait` tries exactly once and reports `LockError::Held`;
    /// otherwise an expired wait reports `LockError::Timeout`.
    async fn acquire(
        &self,
        key: &LockKey,
        operation: LockOperation,
        wait: Duration,
    ) -> Result<LockInfo, LockError>;

    async fn release(
        &self,
        key: &LockKey,
        lock_id: &LockId,
        reason: ReleaseReason,
    ) -> Result<(), LockError>;

    async fn holder(&self, key: &LockKey) -> Result<Option<LockInfo>, LockError>;
}
