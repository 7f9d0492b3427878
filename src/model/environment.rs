// ABOUTME: Persisted environment record and per-provider environment config.
// ABOUTME: Planning refuses to touch an environment that is not READY.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::service::CloudProvider;
use crate::types::EnvironmentName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentStatus {
    Creating,
    Ready,
    CreateFailed,
    Destroying,
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvironmentStatus::Creating => "CREATING",
            EnvironmentStatus::Ready => "READY",
            EnvironmentStatus::CreateFailed => "CREATE_FAILED",
            EnvironmentStatus::Destroying => "DESTROYING",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpEnvironmentConfig {
    pub project_id: String,
    pub default_region: String,
    pub artifact_bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsEnvironmentConfig {
    pub account_id: String,
    pub region: String,
    pub artifact_bucket: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub name: EnvironmentName,
    pub status: EnvironmentStatus,
    #[serde(default)]
    pub gcp: Option<GcpEnvironmentConfig>,
    #[serde(default)]
    pub aws: Option<AwsEnvironmentConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentState {
    /// A READY environment without any provider configured.
    pub fn ready(name: EnvironmentName) -> Self {
        let now = Utc::now();
        Self {
            name,
            status: EnvironmentStatus::Ready,
            gcp: None,
            aws: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: EnvironmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_gcp(mut self, config: GcpEnvironmentConfig) -> Self {
        self.gcp = Some(config);
        self
    }

    pub fn with_aws(mut self, config: AwsEnvironmentConfig) -> Self {
        self.aws = Some(config);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == EnvironmentStatus::Ready
    }

    pub fn supports(&self, provider: CloudProvider) -> bool {
        self.region(provider).is_some()
    }

    /// Region for the provider, if this environment is configured for it.
    pub fn region(&self, provider: CloudProvider) -> Option<&str> {
        match provider {
            CloudProvider::Gcp => self.gcp.as_ref().map(|c| c.default_region.as_str()),
            CloudProvider::Aws => self.aws.as_ref().map(|c| c.region.as_str()),
        }
    }

    pub fn artifact_bucket(&self, provider: CloudProvider) -> Option<&str> {
        match provider {
            CloudProvider::Gcp => self.gcp.as_ref().map(|c| c.artifact_bucket.as_str()),
            CloudProvider::Aws => self.aws.as_ref().map(|c| c.artifact_bucket.as_str()),
        }
    }
}
