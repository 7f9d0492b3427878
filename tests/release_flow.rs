// ABOUTME: End-to-end release scenarios through the orchestrator.
// ABOUTME: Uses the in-memory backend and fake workflows to check state transitions and locks.

mod support;

use std::sync::Arc;
use std::time::Duration;

use shipwright::backend::{
    LockBackend, LockKey, LockOperation, MemoryBackend, OperationType, ReleaseReason, StateStore,
};
use shipwright::model::{EnvironmentStatus, ServiceStatus};
use shipwright::orchestrator::{Orchestrator, OrchestratorErrorKind};
use shipwright::release::{AutoApprove, LockSettings, ServicePlanError};
use shipwright::workflow::WorkflowRegistry;
use support::*;
use tokio::sync::Semaphore;

struct Harness {
    backend: Arc<MemoryBackend>,
    workflow: Arc<FakeWorkflow>,
    orchestrator: Orchestrator,
    _project: tempfile::TempDir,
}

fn harness_with(
    backend: Arc<MemoryBackend>,
    workflow: FakeWorkflow,
    settings: LockSettings,
) -> Harness {
    init_tracing();
    let project = project_dir();
    let workflow = Arc::new(workflow);
    let orchestrator = Orchestrator::with_backend(
        Arc::clone(&backend),
        WorkflowRegistry::uniform(workflow.clone()),
        project.path(),
        settings,
    );
    Harness {
        backend,
        workflow,
        orchestrator,
        _project: project,
    }
}

fn harness(configure: impl FnOnce(FakeWorkflow) -> FakeWorkflow) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_environment(ready_environment("staging"));
    backend.insert_environment(ready_environment("prod"));
    let workflow = configure(FakeWorkflow::new(Arc::clone(&backend)));
    harness_with(backend, workflow, quick_locks())
}

mod deploy {
    use super::*;

    #[tokio::test]
    async fn new_service_is_deployed_and_lock_completed() {
        let h = harness(|w| w);
        let staging = env_name("staging");

        let report = h
            .orchestrator
            .deploy(&[cloud_run("api")], &staging, &mut AutoApprove)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary.success_count(), 1);

        let state = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(state.status, ServiceStatus::Ready);
        assert_eq!(state.provider_id.as_deref(), Some("staging/api"));
        assert!(state.image_ref.unwrap().starts_with("registry.example/api:"));

        let statuses: Vec<_> = h
            .backend
            .service_writes()
            .into_iter()
            .map(|(_, s)| s.status)
            .collect();
        assert_eq!(statuses, vec![ServiceStatus::Deploying, ServiceStatus::Ready]);

        let calls = h.workflow.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status_at_call, Some(ServiceStatus::Deploying));
        assert_eq!(calls[0].region.as_deref(), Some("staging-central1"));

        let releases = h.backend.releases();
        let service_release = releases
            .iter()
            .find(|r| r.operation.operation_type == OperationType::DeployService)
            .unwrap();
        assert_eq!(service_release.reason, ReleaseReason::Completed);
        assert_eq!(service_release.lock_id.to_string(), calls[0].lock_id);
        assert!(!h.backend.is_locked(&LockKey::Environment(staging.clone())));
    }

    #[tokio::test]
    async fn redeploy_with_changed_inputs_shows_diff_and_keeps_created_at() {
        let h = harness(|w| w);
        let staging = env_name("staging");
        let previous = ready_service(&cloud_run("api"), "registry.example/api:old");
        h.backend.insert_service(&staging, previous.clone());

        let mut presenter = RecordingPresenter::default();
        let report = h
            .orchestrator
            .deploy(
                &[cloud_run("api").with_arg("cpu", 2)],
                &staging,
                &mut presenter,
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(presenter.shown.len(), 1);
        assert!(presenter.shown[0].contains("+ cpu: 2"), "{}", presenter.shown[0]);

        let state = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(state.status, ServiceStatus::Ready);
        assert_eq!(state.created_at, previous.created_at);
        assert_ne!(state.image_ref, previous.image_ref);
        assert_eq!(state.inputs.unwrap()["cpu"], 2);
    }

    #[tokio::test]
    async fn mismatched_product_is_skipped_without_stopping_batch() {
        let h = harness(|w| w);
        let staging = env_name("staging");
        h.backend
            .insert_service(&staging, ready_service(&fargate("api"), "ecr/api:1"));

        let report = h
            .orchestrator
            .deploy(
                &[cloud_run("api"), cloud_run("worker")],
                &staging,
                &mut AutoApprove,
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.planning_failures.len(), 1);
        assert!(matches!(
            &report.planning_failures[0],
            ServicePlanError::ServiceProductMismatch { service, .. } if service.as_str() == "api"
        ));
        assert_eq!(report.summary.outcomes.len(), 1);
        assert_eq!(report.summary.outcomes[0].service_ref, "CloudRun(worker)");

        let api = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(api.image_ref.as_deref(), Some("ecr/api:1"));
    }

    #[tokio::test]
    async fn services_run_in_parallel() {
        let h = harness(|w| w.with_delay(Duration::from_millis(100)));
        let staging = env_name("staging");

        let report = h
            .orchestrator
            .deploy(
                &[cloud_run("api"), cloud_run("web"), fargate("worker")],
                &staging,
                &mut AutoApprove,
            )
            .await
            .unwrap();

        assert_eq!(report.summary.success_count(), 3);
        assert_eq!(h.workflow.max_active(), 3);
        let order: Vec<_> = report
            .summary
            .outcomes
            .iter()
            .map(|o| o.service_ref.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["CloudRun(api)", "CloudRun(web)", "EcsFargate(worker)"]
        );
    }

    #[tokio::test]
    async fn empty_selection_is_a_successful_no_op() {
        let h = harness(|w| w);
        let mut presenter = RecordingPresenter {
            reject: vec!["api".to_string()],
            ..Default::default()
        };

        let report = h
            .orchestrator
            .deploy(&[cloud_run("api")], &env_name("staging"), &mut presenter)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.unselected, 1);
        assert!(report.summary.is_empty());
        assert!(h.backend.service_writes().is_empty());
        assert!(h.backend.releases().is_empty());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn workflow_failure_restores_snapshot_fields() {
        let h = harness(|w| w.failing_for("api"));
        let staging = env_name("staging");
        let previous = ready_service(&cloud_run("api"), "registry.example/api:good");
        h.backend.insert_service(&staging, previous.clone());

        let report = h
            .orchestrator
            .deploy(
                &[cloud_run("api").with_dockerfile("Dockerfile")],
                &staging,
                &mut AutoApprove,
            )
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.summary.failure_count(), 1);
        let outcome = &report.summary.outcomes[0];
        assert!(outcome.error.as_deref().unwrap().contains("NetworkError"));

        let state = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(state.status, ServiceStatus::DeployFailed);
        assert_eq!(state.inputs, previous.inputs);
        assert_eq!(state.provider_id, previous.provider_id);
        assert_eq!(state.service_url, previous.service_url);
        assert_eq!(state.image_ref, previous.image_ref);

        let release = h.backend.releases().pop().unwrap();
        assert_eq!(release.reason, ReleaseReason::Completed);
    }

    #[tokio::test]
    async fn failure_is_recorded_in_release_log() {
        let h = harness(|w| w.failing_for("api"));
        let logs = tempfile::tempdir().unwrap();
        let orchestrator = h.orchestrator.with_log_dir(logs.path());
        let staging = env_name("staging");

        let report = orchestrator
            .deploy(&[cloud_run("api"), cloud_run("web")], &staging, &mut AutoApprove)
            .await
            .unwrap();

        let outcomes = &report.summary.outcomes;
        let failed = outcomes.iter().find(|o| !o.success).unwrap();
        let path = failed.log_file.as_ref().unwrap();
        assert!(path.starts_with(logs.path().join("staging/logs")));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("api-{}.log", failed.deployment_id)
        );
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("deploy failed: NetworkError"));

        let succeeded = outcomes.iter().find(|o| o.success).unwrap();
        assert!(succeeded.log_file.is_some());
        assert_ne!(succeeded.log_file, failed.log_file);
    }

    #[tokio::test]
    async fn failed_first_deploy_leaves_no_provider_fields() {
        let h = harness(|w| w.failing_for("api"));
        let staging = env_name("staging");

        h.orchestrator
            .deploy(&[cloud_run("api")], &staging, &mut AutoApprove)
            .await
            .unwrap();

        let state = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(state.status, ServiceStatus::DeployFailed);
        assert!(state.inputs.is_none());
        assert!(state.provider_id.is_none());
        assert!(state.image_ref.is_none());
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let h = harness(|w| w.failing_for("web").with_delay(Duration::from_millis(20)));

        let report = h
            .orchestrator
            .deploy(
                &[cloud_run("api"), cloud_run("web"), cloud_run("worker")],
                &env_name("staging"),
                &mut AutoApprove,
            )
            .await
            .unwrap();

        assert_eq!(report.summary.success_count(), 2);
        assert_eq!(report.summary.failure_count(), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn environment_not_ready_aborts_batch() {
        let h = harness(|w| w);
        h.backend.insert_environment(
            ready_environment("dev").with_status(EnvironmentStatus::Creating),
        );

        let err = h
            .orchestrator
            .deploy(&[cloud_run("api")], &env_name("dev"), &mut AutoApprove)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), OrchestratorErrorKind::EnvironmentNotReady);
        assert!(h.workflow.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_environment_aborts_batch() {
        let h = harness(|w| w);

        let err = h
            .orchestrator
            .deploy(&[cloud_run("api")], &env_name("qa"), &mut AutoApprove)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), OrchestratorErrorKind::EnvironmentNotFound);
    }

    #[tokio::test]
    async fn busy_environment_lock_times_out() {
        let h = harness(|w| w);
        let staging = env_name("staging");
        let held = h
            .backend
            .acquire(
                &LockKey::Environment(staging.clone()),
                LockOperation::new(OperationType::LockEnvironment),
                Duration::ZERO,
            )
            .await
            .unwrap();

        let err = h
            .orchestrator
            .deploy(&[cloud_run("api")], &staging, &mut AutoApprove)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), OrchestratorErrorKind::EnvironmentBusy);
        assert!(h.backend.service_writes().is_empty());
        h.backend
            .release(
                &LockKey::Environment(staging),
                &held.lock_id,
                ReleaseReason::Completed,
            )
            .await
            .unwrap();
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn second_batch_sees_pending_service() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(|w| w.gated(Arc::clone(&gate)));
        let staging = env_name("staging");
        let started = h.workflow.started();
        let defs = [cloud_run("api")];
        let (mut approve_first, mut approve_second) = (AutoApprove, AutoApprove);

        let first = h.orchestrator.deploy(&defs, &staging, &mut approve_first);
        let second = async {
            started.notified().await;
            let report = h
                .orchestrator
                .deploy(&defs, &staging, &mut approve_second)
                .await;
            gate.add_permits(1);
            report
        };
        let (first, second) = tokio::join!(first, second);

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.summary.success_count(), 1);
        assert!(second.summary.is_empty());
        assert!(matches!(
            &second.planning_failures[0],
            ServicePlanError::ServiceIsPending {
                status: ServiceStatus::Deploying,
                ..
            }
        ));
        assert_eq!(h.workflow.calls().len(), 1);
    }
}

mod promote {
    use super::*;

    #[tokio::test]
    async fn promotes_source_image_into_target() {
        let h = harness(|w| w);
        let staging = env_name("staging");
        let prod = env_name("prod");
        let source = ready_service(&cloud_run("api"), "registry.example/api:sha-1234");
        h.backend.insert_service(&staging, source.clone());

        let report = h
            .orchestrator
            .promote(&[cloud_run("api")], &staging, &prod, &mut AutoApprove)
            .await
            .unwrap();

        assert!(report.is_success());
        let calls = h.workflow.calls();
        assert_eq!(calls[0].source_image.as_deref(), Some("registry.example/api:sha-1234"));
        assert_eq!(calls[0].source_region.as_deref(), Some("staging-central1"));
        assert_eq!(calls[0].region.as_deref(), Some("prod-central1"));
        assert_eq!(calls[0].status_at_call, Some(ServiceStatus::Promoting));

        let target = h
            .backend
            .load_service(&prod, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(target.status, ServiceStatus::Ready);
        assert_eq!(target.image_ref.as_deref(), Some("registry.example/api:sha-1234"));

        let unchanged = h
            .backend
            .load_service(&staging, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(unchanged, source);
    }

    #[tokio::test]
    async fn failed_promote_is_marked_promote_failed() {
        let h = harness(|w| w.failing_for("api"));
        let staging = env_name("staging");
        let prod = env_name("prod");
        h.backend
            .insert_service(&staging, ready_service(&cloud_run("api"), "img:1"));

        let report = h
            .orchestrator
            .promote(&[cloud_run("api")], &staging, &prod, &mut AutoApprove)
            .await
            .unwrap();

        assert!(!report.is_success());
        let target = h
            .backend
            .load_service(&prod, &service_name("api"))
            .await
            .unwrap();
        assert_eq!(target.status, ServiceStatus::PromoteFailed);
        assert!(target.image_ref.is_none());
    }

    #[tokio::test]
    async fn source_not_ready_is_skipped() {
        let h = harness(|w| w);
        let staging = env_name("staging");
        let mut broken = ready_service(&cloud_run("api"), "img:1");
        broken.status = ServiceStatus::DeployFailed;
        h.backend.insert_service(&staging, broken);

        let report = h
            .orchestrator
            .promote(
                &[cloud_run("api"), cloud_run("web")],
                &staging,
                &env_name("prod"),
                &mut AutoApprove,
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(matches!(
            report.planning_failures[0],
            ServicePlanError::ServiceNotReady { .. }
        ));
        assert!(matches!(
            report.planning_failures[1],
            ServicePlanError::SourceServiceNotFound { .. }
        ));
        assert!(h.workflow.calls().is_empty());
    }

    #[tokio::test]
    async fn promote_to_same_environment_is_rejected() {
        let h = harness(|w| w);
        let staging = env_name("staging");

        let err = h
            .orchestrator
            .promote(&[cloud_run("api")], &staging, &staging, &mut AutoApprove)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), OrchestratorErrorKind::SameEnvironment);
    }
}
