// ABOUTME: Test support utilities.
// ABOUTME: Provides fake provider workflows, environment fixtures and project directories.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shipwright::backend::{MemoryBackend, StateStore};
use shipwright::model::{
    AwsEnvironmentConfig, EnvironmentState, GcpEnvironmentConfig, ProviderOutputs, ReleaseKind,
    ServiceDefinition, ServiceProduct, ServiceState, ServiceStatus,
};
use shipwright::release::{LockSettings, PlanPresenter, ReleasePlan, SelectionContext};
use shipwright::types::{EnvironmentName, ServiceName};
use shipwright::workflow::{DeployInputs, PromoteInputs, ProviderWorkflow, WorkflowError};
use tokio::sync::{Notify, Semaphore};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("shipwright=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn env_name(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).unwrap()
}

pub fn service_name(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

/// A READY environment configured for both providers.
pub fn ready_environment(name: &str) -> EnvironmentState {
    EnvironmentState::ready(env_name(name))
        .with_gcp(GcpEnvironmentConfig {
            project_id: format!("acme-{name}"),
            default_region: format!("{name}-central1"),
            artifact_bucket: format!("acme-{name}-artifacts"),
        })
        .with_aws(AwsEnvironmentConfig {
            account_id: "123456789012".to_string(),
            region: "eu-west-1".to_string(),
            artifact_bucket: format!("acme-{name}-ecr"),
        })
}

pub fn cloud_run(name: &str) -> ServiceDefinition {
    ServiceDefinition::new(service_name(name), ServiceProduct::GcpCloudRun)
}

pub fn fargate(name: &str) -> ServiceDefinition {
    ServiceDefinition::new(service_name(name), ServiceProduct::AwsEcsFargate)
}

/// A project directory with a Dockerfile at its root.
pub fn project_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    dir
}

/// A READY service record as a previous successful release would leave it.
pub fn ready_service(definition: &ServiceDefinition, image: &str) -> ServiceState {
    let created = chrono::Utc::now() - chrono::Duration::days(7);
    ServiceState::in_flight(definition, ReleaseKind::Deploy, None, created).released(
        ProviderOutputs {
            provider_id: format!("{}-provider", definition.name),
            service_url: Some(format!("https://{}.example", definition.name)),
            image_ref: image.to_string(),
        },
        created,
    )
}

/// Short lock waits so contention tests finish quickly.
pub fn quick_locks() -> LockSettings {
    LockSettings {
        environment_wait: Duration::from_millis(50),
        service_wait: Duration::ZERO,
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowCall {
    pub kind: ReleaseKind,
    pub service: ServiceName,
    pub environment: EnvironmentName,
    /// Persisted status of the service when the workflow started.
    pub status_at_call: Option<ServiceStatus>,
    pub source_image: Option<String>,
    pub source_region: Option<String>,
    pub region: Option<String>,
    pub lock_id: String,
    pub deployment_id: String,
}

/// Fake provider workflow with configurable failures, delay and gating.
pub struct FakeWorkflow {
    store: Arc<MemoryBackend>,
    calls: Mutex<Vec<WorkflowCall>>,
    failing: HashSet<String>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    started: Arc<Notify>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeWorkflow {
    pub fn new(store: Arc<MemoryBackend>) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            gate: None,
            started: Arc::new(Notify::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Fail every release of `service` with a network error.
    pub fn failing_for(mut self, service: &str) -> Self {
        self.failing.insert(service.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every call until the semaphore hands out a permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified once per call, after the call is recorded.
    pub fn started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    pub fn calls(&self) -> Vec<WorkflowCall> {
        self.calls.lock().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn run(&self, call: WorkflowCall) -> Result<ProviderOutputs, WorkflowError> {
        let service = call.service.to_string();
        let image = call
            .source_image
            .clone()
            .unwrap_or_else(|| format!("registry.example/{}:{}", service, call.deployment_id));
        let environment = call.environment.to_string();
        self.calls.lock().push(call);
        self.started.notify_one();

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&service) {
            return Err(WorkflowError::Failed(
                "NetworkError: connection reset by provider".to_string(),
            ));
        }
        Ok(ProviderOutputs {
            provider_id: format!("{environment}/{service}"),
            service_url: Some(format!("https://{service}.{environment}.example")),
            image_ref: image,
        })
    }

    async fn status_of(&self, environment: &EnvironmentName, service: &ServiceName) -> Option<ServiceStatus> {
        self.store
            .find_service(environment, service)
            .await
            .unwrap()
            .map(|s| s.status)
    }
}

#[async_trait]
impl ProviderWorkflow for FakeWorkflow {
    async fn deploy(&self, inputs: &DeployInputs) -> Result<ProviderOutputs, WorkflowError> {
        let call = WorkflowCall {
            kind: ReleaseKind::Deploy,
            service: inputs.service.clone(),
            environment: inputs.environment.clone(),
            status_at_call: self.status_of(&inputs.environment, &inputs.service).await,
            source_image: None,
            source_region: None,
            region: inputs.region.clone(),
            lock_id: inputs.lock_id.to_string(),
            deployment_id: inputs.deployment_id.to_string(),
        };
        self.run(call).await
    }

    async fn promote(&self, inputs: &PromoteInputs) -> Result<ProviderOutputs, WorkflowError> {
        let call = WorkflowCall {
            kind: ReleaseKind::Promote,
            service: inputs.service.clone(),
            environment: inputs.to_environment.clone(),
            status_at_call: self
                .status_of(&inputs.to_environment, &inputs.service)
                .await,
            source_image: Some(inputs.source_image.clone()),
            source_region: inputs.source_region.clone(),
            region: inputs.region.clone(),
            lock_id: inputs.lock_id.to_string(),
            deployment_id: inputs.deployment_id.to_string(),
        };
        self.run(call).await
    }
}

/// Approves everything and remembers what it was shown.
#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Vec<String>,
    /// Services to drop from the selection.
    pub reject: Vec<String>,
}

impl PlanPresenter for RecordingPresenter {
    fn select(
        &mut self,
        plans: Vec<ReleasePlan>,
        _context: &SelectionContext<'_>,
    ) -> std::io::Result<Vec<ReleasePlan>> {
        self.shown.extend(plans.iter().map(|p| p.describe()));
        Ok(plans
            .into_iter()
            .filter(|p| !self.reject.contains(&p.service().to_string()))
            .collect())
    }
}

/// Write `contents` as an executable script.
pub fn write_script(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
