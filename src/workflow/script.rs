// ABOUTME: Workflow that delegates a release to an executable script.
// ABOUTME: Inputs go in as JSON on stdin plus SHIPWRIGHT_* variables; outputs come back as JSON.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{DeployInputs, PromoteInputs, ProviderWorkflow, WorkflowError};
use crate::model::{ProviderOutputs, ReleaseKind};

/// Runs `<script> deploy` or `<script> promote`.
///
/// The script must print a JSON object with `provider_id`, `image_ref` and
/// optionally `service_url` as its last non-empty stdout line.
#[derive(Debug, Clone)]
pub struct ScriptWorkflow {
    script: PathBuf,
}

impl ScriptWorkflow {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    async fn run<T: Serialize>(
        &self,
        kind: ReleaseKind,
        inputs: &T,
        env: HashMap<String, String>,
        log_file: Option<&Path>,
    ) -> Result<ProviderOutputs, WorkflowError> {
        if !self.script.is_file() {
            return Err(WorkflowError::MissingScript(self.script.clone()));
        }

        let payload = serde_json::to_vec(inputs)
            .map_err(|e| WorkflowError::InvalidOutput(format!("unserializable inputs: {e}")))?;
        let spawn_err = |source| WorkflowError::Spawn {
            path: self.script.clone(),
            source,
        };

        tracing::info!("Running {} workflow: {}", kind, self.script.display());

        let mut child = Command::new(&self.script)
            .arg(kind.verb())
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                // Scripts may exit without reading their inputs.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!("{} workflow closed stdin early", kind);
                }
                Err(e) => return Err(spawn_err(e)),
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if let Some(path) = log_file
            && let Err(e) = append_log(path, &self.script, kind, &output).await
        {
            tracing::warn!("failed to write workflow log {}: {}", path.display(), e);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.is_empty() {
            tracing::debug!("{} workflow stderr: {}", kind, stderr.trim_end());
        }

        if !output.status.success() {
            return Err(WorkflowError::Exited {
                code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        parse_outputs(&String::from_utf8_lossy(&output.stdout))
    }
}

async fn append_log(
    path: &Path,
    script: &Path,
    kind: ReleaseKind,
    output: &Output,
) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let header = format!("$ {} {}\n", script.display(), kind.verb());
    file.write_all(header.as_bytes()).await?;
    file.write_all(&output.stdout).await?;
    file.write_all(&output.stderr).await?;
    let footer = match output.status.code() {
        Some(code) => format!("[exit {code}]\n"),
        None => "[terminated by signal]\n".to_string(),
    };
    file.write_all(footer.as_bytes()).await?;
    file.flush().await
}

fn parse_outputs(stdout: &str) -> Result<ProviderOutputs, WorkflowError> {
    let last = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| WorkflowError::InvalidOutput("workflow printed nothing".to_string()))?;
    serde_json::from_str(last.trim()).map_err(|e| WorkflowError::InvalidOutput(e.to_string()))
}

#[async_trait]
impl ProviderWorkflow for ScriptWorkflow {
    async fn deploy(&self, inputs: &DeployInputs) -> Result<ProviderOutputs, WorkflowError> {
        let mut env = HashMap::new();
        env.insert("SHIPWRIGHT_OPERATION".to_string(), "deploy".to_string());
        env.insert("SHIPWRIGHT_SERVICE".to_string(), inputs.service.to_string());
        env.insert(
            "SHIPWRIGHT_ENVIRONMENT".to_string(),
            inputs.environment.to_string(),
        );
        env.insert("SHIPWRIGHT_PRODUCT".to_string(), inputs.product.to_string());
        env.insert(
            "SHIPWRIGHT_DEPLOYMENT_ID".to_string(),
            inputs.deployment_id.to_string(),
        );
        env.insert("SHIPWRIGHT_LOCK_ID".to_string(), inputs.lock_id.to_string());
        env.insert(
            "SHIPWRIGHT_SOURCE_DIR".to_string(),
            inputs.source_dir.display().to_string(),
        );
        env.insert("SHIPWRIGHT_DOCKERFILE".to_string(), inputs.dockerfile.clone());
        if let Some(ref region) = inputs.region {
            env.insert("SHIPWRIGHT_REGION".to_string(), region.clone());
        }
        self.run(ReleaseKind::Deploy, inputs, env, inputs.log_file.as_deref())
            .await
    }

    async fn promote(&self, inputs: &PromoteInputs) -> Result<ProviderOutputs, WorkflowError> {
        let mut env = HashMap::new();
        env.insert("SHIPWRIGHT_OPERATION".to_string(), "promote".to_string());
        env.insert("SHIPWRIGHT_SERVICE".to_string(), inputs.service.to_string());
        env.insert(
            "SHIPWRIGHT_ENVIRONMENT".to_string(),
            inputs.to_environment.to_string(),
        );
        env.insert(
            "SHIPWRIGHT_FROM_ENVIRONMENT".to_string(),
            inputs.from_environment.to_string(),
        );
        env.insert("SHIPWRIGHT_PRODUCT".to_string(), inputs.product.to_string());
        env.insert(
            "SHIPWRIGHT_DEPLOYMENT_ID".to_string(),
            inputs.deployment_id.to_string(),
        );
        env.insert("SHIPWRIGHT_LOCK_ID".to_string(), inputs.lock_id.to_string());
        env.insert(
            "SHIPWRIGHT_SOURCE_IMAGE".to_string(),
            inputs.source_image.clone(),
        );
        if let Some(ref region) = inputs.region {
            env.insert("SHIPWRIGHT_REGION".to_string(), region.clone());
        }
        self.run(ReleaseKind::Promote, inputs, env, inputs.log_file.as_deref())
            .await
    }
}
