// ABOUTME: Lock handles and the coordinator that re-validates plans under the environment lock.
// ABOUTME: Stale plans are abandoned; still-valid plans leave holding their service lock.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    LockBackend, LockError, LockInfo, LockKey, LockOperation, OperationType, ReleaseReason,
    StateStore,
};
use crate::types::{EnvironmentName, LockId, ServiceName};

use super::error::ReleaseError;
use super::plan::ReleasePlan;

/// How long to wait for each tier of lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub environment_wait: Duration,
    pub service_wait: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            environment_wait: Duration::from_secs(30),
            service_wait: Duration::ZERO,
        }
    }
}

/// A held lock. `release` consumes the handle, so it can only be released once.
#[must_use = "a lock handle must be released"]
pub struct LockHandle {
    backend: Arc<dyn LockBackend>,
    key: LockKey,
    info: LockInfo,
    released: bool,
}

impl LockHandle {
    pub async fn acquire(
        backend: Arc<dyn LockBackend>,
        key: LockKey,
        operation: LockOperation,
        wait: Duration,
    ) -> Result<Self, LockError> {
        let info = backend.acquire(&key, operation, wait).await?;
        Ok(Self {
            backend,
            key,
            info,
            released: false,
        })
    }

    pub fn id(&self) -> &LockId {
        &self.info.lock_id
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub async fn release(mut self, reason: ReleaseReason) -> Result<(), LockError> {
        self.released = true;
        self.backend
            .release(&self.key, &self.info.lock_id, reason)
            .await
    }

    /// Release, logging instead of returning a failure.
    pub async fn release_or_warn(self, reason: ReleaseReason) {
        let key = self.key.to_string();
        if let Err(e) = self.release(reason).await {
            tracing::warn!("failed to release lock on {}: {}", key, e);
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                "lock on {} ({}) dropped without being released",
                self.key,
                self.info.lock_id
            );
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("lock_id", &self.info.lock_id)
            .finish()
    }
}

/// A plan that passed re-validation, with its service lock held.
#[derive(Debug)]
pub struct LockedPlan {
    pub plan: ReleasePlan,
    pub lock: LockHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// Persisted state no longer matches the plan's snapshot.
    StateChanged,
    /// Another holder has the service lock.
    LockUnavailable(String),
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonReason::StateChanged => f.write_str("state changed since planning"),
            AbandonReason::LockUnavailable(reason) => write!(f, "lock unavailable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedPlan {
    pub service: ServiceName,
    pub service_ref: String,
    pub reason: AbandonReason,
}

#[derive(Debug, Default)]
pub struct LockOutcome {
    pub locked: Vec<LockedPlan>,
    pub abandoned: Vec<AbandonedPlan>,
}

pub struct LockCoordinator {
    locks: Arc<dyn LockBackend>,
    store: Arc<dyn StateStore>,
    settings: LockSettings,
}

impl LockCoordinator {
    pub fn new(
        locks: Arc<dyn LockBackend>,
        store: Arc<dyn StateStore>,
        settings: LockSettings,
    ) -> Self {
        Self {
            locks,
            store,
            settings,
        }
    }

    /// Lock every plan whose snapshot still matches persisted state.
    ///
    /// The environment lock is held only for the duration of this call.
    pub async fn lock_valid_plans(
        &self,
        plans: Vec<ReleasePlan>,
        environment: &EnvironmentName,
    ) -> Result<LockOutcome, ReleaseError> {
        let environment_lock = LockHandle::acquire(
            Arc::clone(&self.locks),
            LockKey::Environment(environment.clone()),
            LockOperation::new(OperationType::LockEnvironment),
            self.settings.environment_wait,
        )
        .await
        .map_err(|source| ReleaseError::EnvironmentLock {
            environment: environment.clone(),
            source,
        })?;
        tracing::debug!("holding environment lock on {}", environment);

        let outcome = self.lock_each(plans).await;
        let released = environment_lock.release(ReleaseReason::Completed).await;

        match (outcome, released) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(outcome), Err(e)) => {
                abandon_all(outcome.locked).await;
                Err(ReleaseError::Lock(e))
            }
            (Err(e), released) => {
                if let Err(release_err) = released {
                    tracing::warn!(
                        "failed to release environment lock on {}: {}",
                        environment,
                        release_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn lock_each(&self, plans: Vec<ReleasePlan>) -> Result<LockOutcome, ReleaseError> {
        let mut outcome = LockOutcome::default();

        for plan in plans {
            let service_ref = plan.service_ref();
            let lock = match LockHandle::acquire(
                Arc::clone(&self.locks),
                plan.lock_key(),
                plan.lock_operation(),
                self.settings.service_wait,
            )
            .await
            {
                Ok(lock) => lock,
                Err(e) if e.is_contention() => {
                    tracing::warn!("abandoning {}: {}", service_ref, e);
                    outcome.abandoned.push(AbandonedPlan {
                        service: plan.service().clone(),
                        service_ref,
                        reason: AbandonReason::LockUnavailable(e.to_string()),
                    });
                    continue;
                }
                Err(e) => {
                    abandon_all(outcome.locked).await;
                    return Err(ReleaseError::Lock(e));
                }
            };

            let current = match self
                .store
                .find_service(plan.target_environment(), plan.service())
                .await
            {
                Ok(current) => current,
                Err(e) => {
                    lock.release_or_warn(ReleaseReason::Abandoned).await;
                    abandon_all(outcome.locked).await;
                    return Err(ReleaseError::Store(e));
                }
            };

            if current.as_ref() == plan.snapshot() {
                tracing::debug!("locked {} ({})", service_ref, lock.id());
                outcome.locked.push(LockedPlan { plan, lock });
            } else {
                tracing::warn!(
                    "abandoning {}: state changed since planning",
                    service_ref
                );
                lock.release_or_warn(ReleaseReason::Abandoned).await;
                outcome.abandoned.push(AbandonedPlan {
                    service: plan.service().clone(),
                    service_ref,
                    reason: AbandonReason::StateChanged,
                });
            }
        }

        Ok(outcome)
    }
}

async fn abandon_all(locked: Vec<LockedPlan>) {
    for LockedPlan { lock, .. } in locked {
        lock.release_or_warn(ReleaseReason::Abandoned).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::EnvironmentName;

    #[tokio::test]
    async fn release_consumes_handle_and_frees_key() {
        let backend = Arc::new(MemoryBackend::new());
        let key = LockKey::Environment(EnvironmentName::new("dev").unwrap());

        let handle = LockHandle::acquire(
            backend.clone(),
            key.clone(),
            LockOperation::new(OperationType::LockEnvironment),
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert!(backend.is_locked(&key));

        handle.release(ReleaseReason::Completed).await.unwrap();
        assert!(!backend.is_locked(&key));
        assert_eq!(backend.releases()[0].reason, ReleaseReason::Completed);
    }

    #[test]
    fn default_waits() {
        let settings = LockSettings::default();
        assert_eq!(settings.environment_wait, Duration::from_secs(30));
        assert!(settings.service_wait.is_zero());
    }
}
