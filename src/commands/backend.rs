// ABOUTME: Opens the local backend and workflows configured for the project.
// ABOUTME: Shared by every command that touches persisted state.

use std::sync::Arc;

use shipwright::backend::LocalBackend;
use shipwright::config::Config;
use shipwright::orchestrator::Orchestrator;
use shipwright::workflow::WorkflowRegistry;

pub fn open_backend(config: &Config) -> Arc<LocalBackend> {
    let dir = config.state_dir();
    tracing::debug!("using state directory {}", dir.display());
    Arc::new(LocalBackend::new(dir))
}

pub fn orchestrator(config: &Config) -> Orchestrator {
    Orchestrator::with_backend(
        open_backend(config),
        WorkflowRegistry::from_directory(&config.workflows_dir()),
        config.root(),
        config.locking.into(),
    )
    .with_log_dir(config.state_dir())
}
