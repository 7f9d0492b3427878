// ABOUTME: Environment command implementation.
// ABOUTME: Registers a READY environment with optional provider configs.

use shipwright::backend::{StateStore, StoreError};
use shipwright::config::Config;
use shipwright::error::{Error, Result};
use shipwright::model::{AwsEnvironmentConfig, EnvironmentState, GcpEnvironmentConfig};
use shipwright::output::Output;
use shipwright::types::EnvironmentName;

use super::backend::open_backend;
use crate::cli::{AwsArgs, GcpArgs};

pub async fn create_environment(
    config: &Config,
    name: EnvironmentName,
    gcp: GcpArgs,
    aws: AwsArgs,
    output: &Output,
) -> Result<()> {
    let backend = open_backend(config);

    match backend.load_environment(&name).await {
        Ok(_) => return Err(Error::EnvironmentExists(name)),
        Err(StoreError::EnvironmentNotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let mut environment = EnvironmentState::ready(name.clone());
    if let (Some(project_id), Some(default_region), Some(artifact_bucket)) =
        (gcp.gcp_project, gcp.gcp_region, gcp.gcp_bucket)
    {
        environment = environment.with_gcp(GcpEnvironmentConfig {
            project_id,
            default_region,
            artifact_bucket,
        });
    }
    if let (Some(account_id), Some(region), Some(artifact_bucket)) =
        (aws.aws_account, aws.aws_region, aws.aws_bucket)
    {
        environment = environment.with_aws(AwsEnvironmentConfig {
            account_id,
            region,
            artifact_bucket,
        });
    }
    if environment.gcp.is_none() && environment.aws.is_none() {
        return Err(Error::InvalidConfig(
            "an environment needs --gcp-project or --aws-account".to_string(),
        ));
    }

    backend.save_environment(&environment).await?;
    output.success(&format!("Created environment {}", name));
    Ok(())
}
