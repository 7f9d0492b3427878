// ABOUTME: Release plans: a desired definition bound to the state it was planned against.
// ABOUTME: Plans render themselves for presentation and for lock metadata.

use std::path::PathBuf;

use crate::backend::{LockKey, LockOperation, OperationType};
use crate::model::{EnvironmentState, ReleaseKind, ServiceDefinition, ServiceState, ServiceStatus};
use crate::types::{DeploymentId, EnvironmentName, LockId, ServiceName};
use crate::workflow::{DeployInputs, PromoteInputs};

use super::diff::{diff_inputs, format_inputs};

/// Build and release a service from its own source.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub definition: ServiceDefinition,
    pub environment: EnvironmentState,
    /// Build directory resolved against the project root.
    pub source_dir: PathBuf,
    /// Persisted state at planning time.
    pub snapshot: Option<ServiceState>,
}

/// Release the image of a READY service from another environment.
#[derive(Debug, Clone)]
pub struct PromotePlan {
    pub definition: ServiceDefinition,
    pub from_environment: EnvironmentState,
    pub to_environment: EnvironmentState,
    /// READY source service; its image is what gets promoted.
    pub source: ServiceState,
    /// Persisted target state at planning time.
    pub snapshot: Option<ServiceState>,
}

#[derive(Debug, Clone)]
pub enum ReleasePlan {
    Deploy(DeployPlan),
    Promote(PromotePlan),
}

impl ReleasePlan {
    pub fn kind(&self) -> ReleaseKind {
        match self {
            ReleasePlan::Deploy(_) => ReleaseKind::Deploy,
            ReleasePlan::Promote(_) => ReleaseKind::Promote,
        }
    }

    pub fn definition(&self) -> &ServiceDefinition {
        match self {
            ReleasePlan::Deploy(plan) => &plan.definition,
            ReleasePlan::Promote(plan) => &plan.definition,
        }
    }

    pub fn service(&self) -> &ServiceName {
        &self.definition().name
    }

    /// e.g. `CloudRun(api)`
    pub fn service_ref(&self) -> String {
        self.definition().service_ref()
    }

    /// The environment whose service record this plan changes.
    pub fn target_environment(&self) -> &EnvironmentName {
        match self {
            ReleasePlan::Deploy(plan) => &plan.environment.name,
            ReleasePlan::Promote(plan) => &plan.to_environment.name,
        }
    }

    pub fn snapshot(&self) -> Option<&ServiceState> {
        match self {
            ReleasePlan::Deploy(plan) => plan.snapshot.as_ref(),
            ReleasePlan::Promote(plan) => plan.snapshot.as_ref(),
        }
    }

    pub fn lock_key(&self) -> LockKey {
        LockKey::Service(self.target_environment().clone(), self.service().clone())
    }

    /// Lock metadata: operation type plus the rendered plan.
    pub fn lock_operation(&self) -> LockOperation {
        let operation_type = match self {
            ReleasePlan::Deploy(_) => OperationType::DeployService,
            ReleasePlan::Promote(_) => OperationType::PromoteService,
        };
        LockOperation::new(operation_type).with_metadata("plan", self.describe())
    }

    /// Human-readable description of what executing this plan will do.
    pub fn describe(&self) -> String {
        let service_ref = self.service_ref();
        let inputs = self.definition().inputs();
        match self {
            ReleasePlan::Deploy(plan) => {
                // A failed first deploy never produced a service; show it as new.
                let previous = plan
                    .snapshot
                    .as_ref()
                    .filter(|s| s.status != ServiceStatus::DeployFailed)
                    .and_then(|s| s.inputs.as_ref());
                match previous {
                    None => with_lines(
                        format!(
                            "{} will be deployed to `{}` with the following configuration:",
                            service_ref, plan.environment.name
                        ),
                        format_inputs(&inputs),
                    ),
                    Some(previous) => {
                        let changes = diff_inputs(previous, &inputs);
                        if changes.is_empty() {
                            format!(
                                "{} matches the existing service configuration in `{}` and will be redeployed",
                                service_ref, plan.environment.name
                            )
                        } else {
                            with_lines(
                                format!(
                                    "{} will be redeployed to `{}` with the following changes:",
                                    service_ref, plan.environment.name
                                ),
                                changes.iter().map(ToString::to_string).collect(),
                            )
                        }
                    }
                }
            }
            ReleasePlan::Promote(plan) => with_lines(
                format!(
                    "{} will be promoted from `{}` to `{}` using image {} with the following configuration:",
                    service_ref,
                    plan.from_environment.name,
                    plan.to_environment.name,
                    plan.source.image_ref.as_deref().unwrap_or("<none>")
                ),
                format_inputs(&inputs),
            ),
        }
    }
}

fn with_lines(header: String, lines: Vec<String>) -> String {
    let mut out = header;
    for line in lines {
        out.push_str("\n    ");
        out.push_str(&line);
    }
    out
}

impl DeployPlan {
    pub fn inputs(&self, lock_id: &LockId, deployment_id: &DeploymentId) -> DeployInputs {
        let provider = self.definition.product.cloud_provider();
        DeployInputs {
            deployment_id: deployment_id.clone(),
            lock_id: lock_id.clone(),
            environment: self.environment.name.clone(),
            service: self.definition.name.clone(),
            product: self.definition.product,
            source_dir: self.source_dir.clone(),
            dockerfile: self.definition.dockerfile.clone(),
            region: self.environment.region(provider).map(str::to_string),
            artifact_bucket: self.environment.artifact_bucket(provider).map(str::to_string),
            args: self.definition.args.clone(),
            log_file: None,
        }
    }
}

impl PromotePlan {
    pub fn inputs(&self, lock_id: &LockId, deployment_id: &DeploymentId) -> PromoteInputs {
        let provider = self.definition.product.cloud_provider();
        PromoteInputs {
            deployment_id: deployment_id.clone(),
            lock_id: lock_id.clone(),
            from_environment: self.from_environment.name.clone(),
            to_environment: self.to_environment.name.clone(),
            service: self.definition.name.clone(),
            product: self.definition.product,
            source_image: self.source.image_ref.clone().unwrap_or_default(),
            source_region: self.from_environment.region(provider).map(str::to_string),
            region: self.to_environment.region(provider).map(str::to_string),
            artifact_bucket: self.to_environment.artifact_bucket(provider).map(str::to_string),
            args: self.definition.args.clone(),
            log_file: None,
        }
    }
}
