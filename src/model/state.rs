// ABOUTME: Persisted service state and the release status state machine.
// ABOUTME: Every update returns a new ServiceState so plan snapshots stay untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::service::{CloudProvider, ServiceDefinition, ServiceProduct};
use crate::types::ServiceName;

/// Release status of a service.
///
/// ```text
/// (absent) | READY | *_FAILED -> DEPLOYING -> READY | DEPLOY_FAILED
/// (absent) | READY | *_FAILED -> PROMOTING -> READY | PROMOTE_FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Ready,
    Deploying,
    DeployFailed,
    Promoting,
    PromoteFailed,
}

impl ServiceStatus {
    /// A release is in flight (or was interrupted while in flight).
    pub fn is_pending(&self) -> bool {
        matches!(self, ServiceStatus::Deploying | ServiceStatus::Promoting)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ServiceStatus::DeployFailed | ServiceStatus::PromoteFailed
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Ready => "READY",
            ServiceStatus::Deploying => "DEPLOYING",
            ServiceStatus::DeployFailed => "DEPLOY_FAILED",
            ServiceStatus::Promoting => "PROMOTING",
            ServiceStatus::PromoteFailed => "PROMOTE_FAILED",
        };
        f.write_str(s)
    }
}

/// The two kinds of release an executor can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Deploy,
    Promote,
}

impl ReleaseKind {
    pub fn in_flight_status(&self) -> ServiceStatus {
        match self {
            ReleaseKind::Deploy => ServiceStatus::Deploying,
            ReleaseKind::Promote => ServiceStatus::Promoting,
        }
    }

    pub fn failed_status(&self) -> ServiceStatus {
        match self {
            ReleaseKind::Deploy => ServiceStatus::DeployFailed,
            ReleaseKind::Promote => ServiceStatus::PromoteFailed,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ReleaseKind::Deploy => "deploy",
            ReleaseKind::Promote => "promote",
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// What a provider workflow reports back after a successful release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutputs {
    pub provider_id: String,
    #[serde(default)]
    pub service_url: Option<String>,
    pub image_ref: String,
}

/// Persisted record of a service within one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    pub name: ServiceName,
    pub product: ServiceProduct,
    pub cloud_provider: CloudProvider,
    pub status: ServiceStatus,
    #[serde(default)]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceState {
    /// State written before the provider workflow runs.
    ///
    /// Provider fields start unset; `created_at` carries over from `previous`.
    pub fn in_flight(
        definition: &ServiceDefinition,
        kind: ReleaseKind,
        previous: Option<&ServiceState>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: definition.name.clone(),
            product: definition.product,
            cloud_provider: definition.product.cloud_provider(),
            status: kind.in_flight_status(),
            inputs: Some(definition.inputs()),
            provider_id: None,
            service_url: None,
            image_ref: None,
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        }
    }

    /// Successful release: READY with the workflow's outputs.
    #[must_use]
    pub fn released(self, outputs: ProviderOutputs, now: DateTime<Utc>) -> Self {
        Self {
            status: ServiceStatus::Ready,
            provider_id: Some(outputs.provider_id),
            service_url: outputs.service_url,
            image_ref: Some(outputs.image_ref),
            updated_at: now,
            ..self
        }
    }

    /// Failed release: provider fields restored from `snapshot` (or unset).
    #[must_use]
    pub fn rolled_back(
        self,
        snapshot: Option<&ServiceState>,
        kind: ReleaseKind,
        now: DateTime<Utc>,
    ) -> Self {
        let (inputs, provider_id, service_url, image_ref) = match snapshot {
            Some(prev) => (
                prev.inputs.clone(),
                prev.provider_id.clone(),
                prev.service_url.clone(),
                prev.image_ref.clone(),
            ),
            None => (None, None, None, None),
        };
        Self {
            status: kind.failed_status(),
            inputs,
            provider_id,
            service_url,
            image_ref,
            updated_at: now,
            ..self
        }
    }
}
