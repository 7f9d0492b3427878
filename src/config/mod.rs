// ABOUTME: Configuration types and parsing for shipwright.yml.
// ABOUTME: Handles discovery, defaults, the state directory override and service selection.

mod deserialize;
mod init;
mod locking;

pub use init::init_config;
pub use locking::LockingConfig;

use crate::error::{Error, Result};
use crate::model::ServiceDefinition;
use crate::types::ServiceName;
use deserialize::{deserialize_project, deserialize_services};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "shipwright.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipwright.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipwright/config.yml";

/// Overrides `backend.path` when set.
pub const STATE_DIR_ENV: &str = "SHIPWRIGHT_STATE_DIR";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_project")]
    pub project: String,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub locking: LockingConfig,

    #[serde(default)]
    pub workflows: WorkflowsConfig,

    #[serde(deserialize_with = "deserialize_services")]
    pub services: NonEmpty<ServiceDefinition>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_state_dir")]
    pub path: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            path: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".shipwright/state")
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowsConfig {
    #[serde(default = "default_workflows_dir")]
    pub directory: PathBuf,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            directory: default_workflows_dir(),
        }
    }
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from(".shipwright/workflows")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Load a config file. The project root is the directory holding it,
    /// or the parent of `.shipwright/` for the nested layout.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        let parent = path.parent().unwrap_or(Path::new(""));
        config.root = if parent.file_name().is_some_and(|name| name == ".shipwright") {
            parent.parent().unwrap_or(Path::new("")).to_path_buf()
        } else {
            parent.to_path_buf()
        };
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("using config {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local backend directory: `$SHIPWRIGHT_STATE_DIR`, else `backend.path`
    /// under the project root.
    pub fn state_dir(&self) -> PathBuf {
        match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.root.join(&self.backend.path),
        }
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.root.join(&self.workflows.directory)
    }

    /// The named services in the order given, or every service when `names` is empty.
    pub fn select_services(&self, names: &[ServiceName]) -> Result<Vec<ServiceDefinition>> {
        if names.is_empty() {
            return Ok(self.services.iter().cloned().collect());
        }
        names
            .iter()
            .map(|name| {
                self.services
                    .iter()
                    .find(|s| &s.name == name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownService(name.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceProduct;

    const MINIMAL: &str = r#"
project: acme
services:
  - name: api
    product: gcp-cloud-run
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.project, "acme");
        assert_eq!(config.backend.path, PathBuf::from(".shipwright/state"));
        assert_eq!(
            config.workflows.directory,
            PathBuf::from(".shipwright/workflows")
        );
        let api = config.services.first();
        assert_eq!(api.product, ServiceProduct::GcpCloudRun);
        assert_eq!(api.dockerfile, "Dockerfile");
    }

    #[test]
    fn load_from_nested_dir_uses_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".shipwright")).unwrap();
        let path = dir.path().join(CONFIG_FILENAME_DIR);
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.root(), dir.path());
    }

    #[test]
    fn select_unknown_service_fails() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let err = config
            .select_services(&[ServiceName::new("worker").unwrap()])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownService(name) if name == "worker"));
    }
}
