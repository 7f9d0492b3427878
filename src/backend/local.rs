// ABOUTME: Directory-backed StateStore and LockBackend for single-host projects.
// ABOUTME: Locks are files published with a hard link so acquisition is atomic.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use super::{
    LockBackend, LockError, LockInfo, LockKey, LockOperation, LockRelease, ReleaseReason,
    StateStore, StoreError,
};
use crate::model::{EnvironmentState, ServiceState};
use crate::types::{EnvironmentName, LockId, ServiceName};

const ENVIRONMENT_FILE: &str = "environment.json";
const SERVICE_FILE: &str = "service.json";
const LOCK_FILE: &str = "flow.lock";
const HISTORY_FILE: &str = "lock-history.jsonl";
const SERVICES_DIR: &str = "services";

/// Polling interval while waiting for a held lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Layout:
///
/// ```text
/// <root>/<env>/environment.json
/// <root>/<env>/flow.lock
/// <root>/<env>/lock-history.jsonl
/// <root>/<env>/services/<service>/service.json
/// <root>/<env>/services/<service>/flow.lock
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn environment_dir(&self, environment: &EnvironmentName) -> PathBuf {
        self.root.join(environment.as_str())
    }

    fn service_dir(&self, environment: &EnvironmentName, service: &ServiceName) -> PathBuf {
        self.environment_dir(environment)
            .join(SERVICES_DIR)
            .join(service.as_str())
    }

    fn lock_path(&self, key: &LockKey) -> PathBuf {
        match key {
            LockKey::Environment(env) => self.environment_dir(env).join(LOCK_FILE),
            LockKey::Service(env, service) => self.service_dir(env, service).join(LOCK_FILE),
        }
    }

    fn history_path(&self, key: &LockKey) -> PathBuf {
        self.environment_dir(key.environment()).join(HISTORY_FILE)
    }

    /// Try once to publish the lock file. Returns false if it already exists.
    ///
    /// The holder info is written to a private temp file first and then
    /// hard-linked into place, so `flow.lock` never exists without its content.
    async fn try_create_lock(&self, path: &Path, info: &LockInfo) -> Result<bool, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(info).map_err(|source| LockError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension(format!("lock.{}.tmp", info.lock_id));
        fs::write(&tmp, &json).await.map_err(|source| LockError::Io {
            path: tmp.clone(),
            source,
        })?;

        let linked = fs::hard_link(&tmp, path).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            tracing::warn!("failed to remove {}: {}", tmp.display(), e);
        }
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    /// Error for a failed acquisition once the wait is over.
    async fn contention(&self, key: &LockKey, wait: Duration) -> Result<LockError, LockError> {
        match self.holder(key).await {
            Ok(Some(holder)) => Ok(holder.contention(key, wait)),
            // Released between our attempt and the read; report the wait.
            Ok(None) => Ok(LockError::Timeout {
                key: key.to_string(),
                waited: wait,
            }),
            Err(LockError::Corrupt { path, source }) => {
                tracing::warn!(
                    "lock file {} is unreadable ({}); remove it once no release is running",
                    path.display(),
                    source
                );
                Ok(LockError::Unreadable {
                    key: key.to_string(),
                    path,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn append_history(&self, key: &LockKey, record: &LockRelease) -> Result<(), LockError> {
        let path = self.history_path(key);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        let mut line = serde_json::to_vec(record).map_err(|source| LockError::Corrupt {
            path: path.clone(),
            source,
        })?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}

/// Read a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = read_optional(path).await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    bytes
        .map(|b| serde_json::from_slice(&b))
        .transpose()
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Write via a temporary file and rename, so readers never see a partial record.
async fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)
}

#[async_trait]
impl StateStore for LocalBackend {
    async fn load_environment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<EnvironmentState, StoreError> {
        let path = self.environment_dir(environment).join(ENVIRONMENT_FILE);
        read_record(&path)
            .await?
            .ok_or_else(|| StoreError::EnvironmentNotFound(environment.clone()))
    }

    async fn save_environment(&self, state: &EnvironmentState) -> Result<(), StoreError> {
        let path = self.environment_dir(&state.name).join(ENVIRONMENT_FILE);
        write_record(&path, state).await
    }

    async fn load_service(
        &self,
        environment: &EnvironmentName,
        service: &ServiceName,
    ) -> Result<ServiceState, StoreError> {
        let path = self.service_dir(environment, service).join(SERVICE_FILE);
        read_record(&path)
            .await?
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
        let holder = self.holder(&key).await?;
        if holder.as_ref().map(|h| &h.lock_id) != Some(lock_id) {
            return Err(StoreError::LockMismatch {
                key: key.to_string(),
                lock_id: lock_id.to_string(),
            });
        }

        let path = self.service_dir(environment, &state.name).join(SERVICE_FILE);
        write_record(&path, state).await?;
        tracing::debug!("saved {} as {}", key, state.status);
        Ok(())
    }

    async fn list_services(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<ServiceState>, StoreError> {
        let dir = self.environment_dir(environment).join(SERVICES_DIR);
        let io_err = |source| StoreError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut services = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path().join(SERVICE_FILE);
            if let Some(state) = read_record::<ServiceState>(&path).await? {
                services.push(state);
            }
        }
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

#[async_trait]
impl LockBackend for LocalBackend {
    async fn acquire(
        &self,
        key: &LockKey,
        operation: LockOperation,
        wait: Duration,
    ) -> Result<LockInfo, LockError> {
        let path = self.lock_path(key);
        let deadline = Instant::now() + wait;
        let info = LockInfo::new(operation);

        loop {
            if self.try_create_lock(&path, &info).await? {
                tracing::debug!("acquired lock on {} ({})", key, info.lock_id);
                return Ok(info);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.contention(key, wait).await?);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(
        &self,
        key: &LockKey,
        lock_id: &LockId,
        reason: ReleaseReason,
    ) -> Result<(), LockError> {
        let info = match self.holder(key).await? {
            Some(info) if &info.lock_id == lock_id => info,
            _ => {
                return Err(LockError::NotHolder {
                    key: key.to_string(),
                    lock_id: lock_id.to_string(),
                });
            }
        };

        let path = self.lock_path(key);
        fs::remove_file(&path)
            .await
            .map_err(|source| LockError::Io { path, source })?;

        let record = LockRelease {
            key: key.to_string(),
            lock_id: info.lock_id,
            operation: info.operation,
            reason,
            released_at: Utc::now(),
        };
        self.append_history(key, &record).await?;
        tracing::debug!("released lock on {} ({:?})", key, reason);
        Ok(())
    }

    async fn holder(&self, key: &LockKey) -> Result<Option<LockInfo>, LockError> {
        let path = self.lock_path(key);
        let bytes = read_optional(&path).await.map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;
        bytes
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(|source| LockError::Corrupt { path, source })
    }
}
