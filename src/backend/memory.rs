// ABOUTME: In-process backend implementing both StateStore and LockBackend.
// ABOUTME: Records every service write and lock release so tests can inspect ordering.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{
    LockBackend, LockError, LockInfo, LockKey, LockOperation, LockRelease, ReleaseReason,
    StateStore, StoreError,
};
use crate::model::{EnvironmentState, ServiceState};
use crate::types::{EnvironmentName, LockId, ServiceName};

#[derive(Debug, Default)]
struct Inner {
    environments: HashMap<EnvironmentName, EnvironmentState>,
    services: HashMap<(EnvironmentName, ServiceName), ServiceState>,
    locks: HashMap<LockKey, LockInfo>,
    writes: Vec<(EnvironmentName, ServiceState)>,
    releases: Vec<LockRelease>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    released: Notify,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service record without going through the lock check.
    pub fn insert_service(&self, environment: &EnvironmentName, state: ServiceState) {
        self.inner
            .lock()
            .services
            .insert((environment.clone(), state.name.clone()), state);
    }

    pub fn insert_environment(&self, state: EnvironmentState) {
        self.inner
            .lock()
            .environments
            .insert(state.name.clone(), state);
    }

    /// Every accepted `save_service` call, in order.
    pub fn service_writes(&self) -> Vec<(EnvironmentName, ServiceState)> {
        self.inner.lock().writes.clone()
    }

    /// Every lock release, in order.
    pub fn releases(&self) -> Vec<LockRelease> {
        self.inner.lock().releases.clone()
    }

    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.inner.lock().locks.contains_key(key)
    }
}

#[async_trait]
impl StateStore for MemoryBackend {
    async fn load_environment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<EnvironmentState, StoreError> {
        self.inner
            .lock()
            .environments
            .get(environment)
            .cloned()
            .ok_or_else(|| StoreError::EnvironmentNotFound(environment.clone()))
    }

    async fn save_environment(&self, state: &EnvironmentState) -> Result<(), StoreError> {
        self.insert_environment(state.clone());
        Ok(())
    }

    async fn load_service(
        &self,
        environment: &EnvironmentName,
        service: &ServiceName,
    ) -> Result<ServiceState, StoreError> {
        self.inner
            .lock()
            .services
            .get(&(environment.clone(), service.clone()))
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotFound {
                environment: environment.clone(),
                service: service.clone(),
            })
    }

    async fn save_service(
        &self,
        environment: &EnvironmentName,
        state: &ServiceState,
        lock_id: &LockId,
    ) -> Result<(), StoreError> {
        let key = LockKey::Service(environment.clone(), state.name.clone());
        let mut inner = self.inner.lock();

        let holds_lock = inner
            .locks
            .get(&key)
            .is_some_and(|info| &info.lock_id == lock_id);
        if !holds_lock {
            return Err(StoreError::LockMismatch {
                key: key.to_string(),
                lock_id: lock_id.to_string(),
            });
        }

        inner
            .services
            .insert((environment.clone(), state.name.clone()), state.clone());
        inner.writes.push((environment.clone(), state.clone()));
        Ok(())
    }

    async fn list_services(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<ServiceState>, StoreError> {
        let inner = self.inner.lock();
        let mut services: Vec<ServiceState> = inner
            .services
            .iter()
            .filter(|((env, _), _)| env == environment)
            .map(|(_, state)| state.clone())
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

#[async_trait]
impl LockBackend for MemoryBackend {
    async fn acquire(
        &self,
        key: &LockKey,
        operation: LockOperation,
        wait: Duration,
    ) -> Result<LockInfo, LockError> {
        let deadline = Instant::now() + wait;
        let info = LockInfo::new(operation);

        loop {
            // Register for wakeups before checking, so a release between the
            // check and the wait is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let blocked_by = {
                let mut inner = self.inner.lock();
                match inner.locks.get(key) {
                    Some(holder) => holder.clone(),
                    None => {
                        inner.locks.insert(key.clone(), info.clone());
                        tracing::debug!("acquired lock on {} ({})", key, info.lock_id);
                        return Ok(info);
                    }
                }
            };

            if wait.is_zero()
                || tokio::time::timeout_at(deadline, notified).await.is_err()
            {
                return Err(blocked_by.contention(key, wait));
            }
        }
    }

    async fn release(
        &self,
        key: &LockKey,
        lock_id: &LockId,
        reason: ReleaseReason,
    ) -> Result<(), LockError> {
        {
            let mut inner = self.inner.lock();
            let info = match inner.locks.get(key) {
                Some(info) if &info.lock_id == lock_id => info.clone(),
                _ => {
                    return Err(LockError::NotHolder {
                        key: key.to_string(),
                        lock_id: lock_id.to_string(),
                    });
                }
            };
            inner.locks.remove(key);
            inner.releases.push(LockRelease {
                key: key.to_string(),
                lock_id: info.lock_id,
                operation: info.operation,
                reason,
                released_at: Utc::now(),
            });
        }
        tracing::debug!("released lock on {} ({:?})", key, reason);
        self.released.notify_waiters();
        Ok(())
    }

    async fn holder(&self, key: &LockKey) -> Result<Option<LockInfo>, LockError> {
        Ok(self.inner.lock().locks.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OperationType;
    use std::sync::Arc;

    fn env() -> EnvironmentName {
        EnvironmentName::new("staging").unwrap()
    }

    fn op() -> LockOperation {
        LockOperation::new(OperationType::LockEnvironment)
    }

    #[tokio::test]
    async fn second_acquire_without_wait_is_held() {
        let backend = MemoryBackend::new();
        let key = LockKey::Environment(env());

        let first = backend.acquire(&key, op(), Duration::ZERO).await.unwrap();
        let err = backend
            .acquire(&key, op(), Duration::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, LockError::Held { pid, .. } if pid == first.pid));
    }

    #[tokio::test]
    async fn waiter_acquires_after_release() {
        let backend = Arc::new(MemoryBackend::new());
        let key = LockKey::Environment(env());
        let first = backend.acquire(&key, op(), Duration::ZERO).await.unwrap();

        let waiter = {
            let backend = Arc::clone(&backend);
            let key = key.clone();
            tokio::spawn(async move { backend.acquire(&key, op(), Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        backend
            .release(&key, &first.lock_id, ReleaseReason::Completed)
            .await
            .unwrap();

        let second = waiter.await.unwrap().unwrap();
        assert_ne!(second.lock_id, first.lock_id);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_times_out() {
        let backend = MemoryBackend::new();
        let key = LockKey::Environment(env());
        backend.acquire(&key, op(), Duration::ZERO).await.unwrap();

        let err = backend
            .acquire(&key, op(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[tokio::test]
    async fn release_by_non_holder_is_rejected() {
        let backend = MemoryBackend::new();
        let key = LockKey::Environment(env());
        backend.acquire(&key, op(), Duration::ZERO).await.unwrap();

        let err = backend
            .release(&key, &LockId::generate(), ReleaseReason::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder { .. }));
        assert!(backend.is_locked(&key));
    }
}
