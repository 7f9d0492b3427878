// ABOUTME: Builds release plans by comparing definitions against persisted state.
// ABOUTME: Per-service problems are collected; only environment problems abort the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::StateStore;
use crate::model::{EnvironmentState, ServiceDefinition, ServiceState, ServiceStatus};
use crate::types::EnvironmentName;

use super::error::{PlanError, ServicePlanError};
use super::plan::{DeployPlan, PromotePlan, ReleasePlan};

/// Plans in input order, plus the services that could not be planned.
#[derive(Debug, Default)]
pub struct PlanBatch {
    pub plans: Vec<ReleasePlan>,
    pub failures: Vec<ServicePlanError>,
}

impl PlanBatch {
    fn push(&mut self, planned: Result<ReleasePlan, ServicePlanError>) {
        match planned {
            Ok(plan) => self.plans.push(plan),
            Err(e) => {
                tracing::warn!("skipping {}: {}", e.service(), e);
                self.failures.push(e);
            }
        }
    }
}

pub struct PlanBuilder {
    store: Arc<dyn StateStore>,
    project_root: PathBuf,
}

impl PlanBuilder {
    pub fn new(store: Arc<dyn StateStore>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub async fn plan_deploy(
        &self,
        definitions: &[ServiceDefinition],
        environment: &EnvironmentName,
    ) -> Result<PlanBatch, PlanError> {
        let environment = self.ready_environment(environment).await?;
        let mut batch = PlanBatch::default();
        let mut seen = HashSet::new();

        for definition in definitions {
            if !seen.insert(&definition.name) {
                batch.push(Err(ServicePlanError::DuplicateService(
                    definition.name.clone(),
                )));
                continue;
            }
            let planned = self.plan_deploy_one(definition, &environment).await?;
            batch.push(planned.map(ReleasePlan::Deploy));
        }

        tracing::debug!(
            "planned {} deploys to {} ({} skipped)",
            batch.plans.len(),
            environment.name,
            batch.failures.len()
        );
        Ok(batch)
    }

    pub async fn plan_promote(
        &self,
        definitions: &[ServiceDefinition],
        from: &EnvironmentName,
        to: &EnvironmentName,
    ) -> Result<PlanBatch, PlanError> {
        if from == to {
            return Err(PlanError::SameEnvironment(from.clone()));
        }
        let from_environment = self.ready_environment(from).await?;
        let to_environment = self.ready_environment(to).await?;
        let mut batch = PlanBatch::default();
        let mut seen = HashSet::new();

        for definition in definitions {
            if !seen.insert(&definition.name) {
                batch.push(Err(ServicePlanError::DuplicateService(
                    definition.name.clone(),
                )));
                continue;
            }
            let planned = self
                .plan_promote_one(definition, &from_environment, &to_environment)
                .await?;
            batch.push(planned.map(ReleasePlan::Promote));
        }

        tracing::debug!(
            "planned {} promotions from {} to {} ({} skipped)",
            batch.plans.len(),
            from,
            to,
            batch.failures.len()
        );
        Ok(batch)
    }

    async fn ready_environment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<EnvironmentState, PlanError> {
        let state = self.store.load_environment(environment).await?;
        if !state.is_ready() {
            return Err(PlanError::EnvironmentNotReady {
                environment: environment.clone(),
                status: state.status,
            });
        }
        Ok(state)
    }

    /// The outer error aborts the batch; the inner one skips this service.
    async fn plan_deploy_one(
        &self,
        definition: &ServiceDefinition,
        environment: &EnvironmentState,
    ) -> Result<Result<DeployPlan, ServicePlanError>, PlanError> {
        let snapshot = self
            .store
            .find_service(&environment.name, &definition.name)
            .await?;
        if let Err(e) = check_existing(definition, snapshot.as_ref()) {
            return Ok(Err(e));
        }

        let provider = definition.product.cloud_provider();
        if !environment.supports(provider) {
            return Ok(Err(ServicePlanError::ProviderNotConfigured {
                service: definition.name.clone(),
                environment: environment.name.clone(),
                provider,
            }));
        }

        let source_dir = self.project_root.join(&definition.build_directory);
        if !source_dir.is_dir() {
            return Ok(Err(ServicePlanError::BuildDirectoryNotFound {
                service: definition.name.clone(),
                path: source_dir,
            }));
        }
        let dockerfile = source_dir.join(&definition.dockerfile);
        if !dockerfile.is_file() {
            return Ok(Err(ServicePlanError::DockerfileNotFound {
                service: definition.name.clone(),
                path: dockerfile,
            }));
        }

        Ok(Ok(DeployPlan {
            definition: definition.clone(),
            environment: environment.clone(),
            source_dir,
            snapshot,
        }))
    }

    async fn plan_promote_one(
        &self,
        definition: &ServiceDefinition,
        from: &EnvironmentState,
        to: &EnvironmentState,
    ) -> Result<Result<PromotePlan, ServicePlanError>, PlanError> {
        let service = &definition.name;

        let Some(source) = self.store.find_service(&from.name, service).await? else {
            return Ok(Err(ServicePlanError::SourceServiceNotFound {
                service: service.clone(),
                environment: from.name.clone(),
            }));
        };
        if source.status != ServiceStatus::Ready {
            return Ok(Err(ServicePlanError::ServiceNotReady {
                service: service.clone(),
                environment: from.name.clone(),
                status: source.status,
            }));
        }
        if source.product != definition.product {
            return Ok(Err(ServicePlanError::ServiceProductMismatch {
                service: service.clone(),
                existing: source.product,
                requested: definition.product,
            }));
        }
        if source.image_ref.is_none() {
            return Ok(Err(ServicePlanError::SourceImageMissing {
                service: service.clone(),
                environment: from.name.clone(),
            }));
        }

        let snapshot = self.store.find_service(&to.name, service).await?;
        if let Err(e) = check_existing(definition, snapshot.as_ref()) {
            return Ok(Err(e));
        }

        let provider = definition.product.cloud_provider();
        for environment in [from, to] {
            if !environment.supports(provider) {
                return Ok(Err(ServicePlanError::ProviderNotConfigured {
                    service: service.clone(),
                    environment: environment.name.clone(),
                    provider,
                }));
            }
        }

        Ok(Ok(PromotePlan {
            definition: definition.clone(),
            from_environment: from.clone(),
            to_environment: to.clone(),
            source,
            snapshot,
        }))
    }
}

/// An existing record must be the same product and have no release in flight.
fn check_existing(
    definition: &ServiceDefinition,
    existing: Option<&ServiceState>,
) -> Result<(), ServicePlanError> {
    let Some(existing) = existing else {
        return Ok(());
    };
    if existing.product != definition.product {
        return Err(ServicePlanError::ServiceProductMismatch {
            service: definition.name.clone(),
            existing: existing.product,
            requested: definition.product,
        });
    }
    if existing.status.is_pending() {
        return Err(ServicePlanError::ServiceIsPending {
            service: definition.name.clone(),
            status: existing.status,
        });
    }
    Ok(())
}
