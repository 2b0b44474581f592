//! Run submission, status tracking, cancellation, and deletion.

use super::helpers::{Stack, config, config_with_secrets, project, stack, workspace};
use pipeline_control::pipeline::{
    adapters::engine::{EngineCondition, RUN_ID_LABEL},
    domain::{
        ErrorKind, PipelineId, PipelineRun, RunId, RunStatus, SUBMISSION_ERROR_KEY, WorkspaceId,
    },
    ports::{PipelineProvider, PipelineRepository},
    services::PipelineServiceError,
};
use mockable::DefaultClock;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_pipeline_persists_a_labelled_pending_run(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");

    assert_eq!(run.status(), RunStatus::Pending);
    let run_name = run.provider_run_name().expect("backend name recorded");
    assert!(run_name.starts_with("web-"));

    let stored = stack
        .repository
        .get_pipeline_run(&run.id().to_string())
        .await
        .expect("lookup succeeds")
        .expect("run stored");
    assert_eq!(stored, run);

    let labels = stack
        .engine
        .execution_labels(run.id())
        .expect("engine readable")
        .expect("execution exists");
    assert_eq!(labels.get(RUN_ID_LABEL), Some(&run.id().to_string()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resubmitting_a_name_reuses_the_pipeline(stack: Stack) {
    let first = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("first submission");
    let second = stack
        .service
        .run_pipeline(config("web").with_git_branch("release"))
        .await
        .expect("second submission");

    assert_ne!(first.id(), second.id());
    assert_eq!(first.pipeline_id(), second.pipeline_id());
    let pipelines = stack
        .repository
        .list_pipelines(&workspace(), &project())
        .await
        .expect("list succeeds");
    assert_eq!(pipelines.len(), 1);
    let pipeline = pipelines.first().expect("one pipeline");
    assert_eq!(
        pipeline.source_config().git_repo.branch.as_deref(),
        Some("release")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn incomplete_config_is_rejected_without_side_effects(stack: Stack) {
    let mut incomplete = config("web");
    incomplete.git_repo.url.clear();

    let err = stack
        .service
        .run_pipeline(incomplete)
        .await
        .expect_err("git URL required");

    assert_eq!(err.kind(), ErrorKind::Validation);
    let runs = stack
        .repository
        .list_pipeline_runs(&workspace(), &project(), 10)
        .await
        .expect("list succeeds");
    assert!(runs.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_secret_blocks_submission(stack: Stack) {
    stack
        .credentials
        .add_secret("default", "git-deploy-key")
        .expect("secret registered");

    let err = stack
        .service
        .run_pipeline(config_with_secrets("web"))
        .await
        .expect_err("registry credential missing");

    assert!(matches!(
        &err,
        PipelineServiceError::MissingSecret { name, namespace, .. }
            if name == "registry-creds" && namespace == "default"
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn secrets_are_checked_in_the_config_namespace(stack: Stack) {
    for secret in ["git-deploy-key", "registry-creds"] {
        stack
            .credentials
            .add_secret("default", secret)
            .expect("secret registered");
    }

    stack
        .service
        .run_pipeline(config_with_secrets("web"))
        .await
        .expect("secrets found in the default namespace");

    let err = stack
        .service
        .run_pipeline(config_with_secrets("web").with_namespace("ci"))
        .await
        .expect_err("secrets absent from ci");
    assert!(matches!(
        err,
        PipelineServiceError::MissingSecret { namespace, .. } if namespace == "ci"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_submission_leaves_a_failed_run(stack: Stack) {
    stack.engine.set_available(false).expect("toggle engine");

    let err = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect_err("engine unreachable");

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.kind().is_retryable());
    let runs = stack
        .repository
        .list_pipeline_runs(&workspace(), &project(), 10)
        .await
        .expect("list succeeds");
    let run = runs.first().expect("intent recorded");
    assert_eq!(run.status(), RunStatus::Failed);
    assert!(run.finished_at().is_some());
    assert!(run.metadata().contains_key(SUBMISSION_ERROR_KEY));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_follows_the_engine_until_terminal(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");

    stack
        .engine
        .set_condition(run.id(), EngineCondition::running())
        .expect("engine update");
    let running = stack
        .service
        .get_status(&workspace(), run.id())
        .await
        .expect("status read");
    assert_eq!(running.status(), RunStatus::Running);

    stack
        .engine
        .set_condition(run.id(), EngineCondition::succeeded())
        .expect("engine update");
    let succeeded = stack
        .service
        .get_status(&workspace(), run.id())
        .await
        .expect("status read");
    assert_eq!(succeeded.status(), RunStatus::Succeeded);
    assert!(succeeded.finished_at().is_some());

    stack
        .engine
        .set_condition(run.id(), EngineCondition::failed("late event"))
        .expect("engine update");
    let still = stack
        .service
        .get_status(&workspace(), run.id())
        .await
        .expect("status read");
    assert_eq!(still.status(), RunStatus::Succeeded);
    assert_eq!(still, succeeded);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runs_are_invisible_to_other_workspaces(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    let intruder = WorkspaceId::new("ws-beta").expect("valid workspace");

    let err = stack
        .service
        .get_status(&intruder, run.id())
        .await
        .expect_err("run belongs to ws-alpha");

    assert!(matches!(err, PipelineServiceError::RunNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_stops_a_running_run_and_is_idempotent(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .set_condition(run.id(), EngineCondition::running())
        .expect("engine update");

    let cancelled = stack
        .service
        .cancel_pipeline(&workspace(), run.id())
        .await
        .expect("cancel succeeds");
    assert_eq!(cancelled.status(), RunStatus::Cancelled);

    let again = stack
        .service
        .cancel_pipeline(&workspace(), run.id())
        .await
        .expect("second cancel is a no-op");
    assert_eq!(again, cancelled);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_reaches_an_execution_whose_handle_was_never_stored(stack: Stack) {
    let run_id = RunId::new();
    let pending = PipelineRun::new(run_id, PipelineId::new(), &config("web"), &DefaultClock);
    stack
        .repository
        .create_pipeline_run(&pending)
        .await
        .expect("pending run stored");
    stack
        .engine
        .run_pipeline(run_id, &config("web"))
        .await
        .expect("engine accepted the run");

    let cancelled = stack
        .service
        .cancel_pipeline(&workspace(), run_id)
        .await
        .expect("cancel succeeds");

    assert_eq!(cancelled.status(), RunStatus::Cancelled);
    assert!(cancelled.provider_run_name().is_some());
    let engine_view = stack
        .engine
        .get_status(&workspace(), run_id)
        .await
        .expect("execution still listed");
    assert_eq!(engine_view.status, RunStatus::Cancelled);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_of_a_run_the_engine_never_saw_is_local(stack: Stack) {
    let run_id = RunId::new();
    let pending = PipelineRun::new(run_id, PipelineId::new(), &config("web"), &DefaultClock);
    stack
        .repository
        .create_pipeline_run(&pending)
        .await
        .expect("pending run stored");

    let cancelled = stack
        .service
        .cancel_pipeline(&workspace(), run_id)
        .await
        .expect("cancel succeeds");

    assert_eq!(cancelled.status(), RunStatus::Cancelled);
    assert!(cancelled.provider_run_name().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_a_succeeded_run_keeps_it_succeeded(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .set_condition(run.id(), EngineCondition::succeeded())
        .expect("engine update");
    stack
        .service
        .get_status(&workspace(), run.id())
        .await
        .expect("status read");

    let after = stack
        .service
        .cancel_pipeline(&workspace(), run.id())
        .await
        .expect("cancel tolerated");

    assert_eq!(after.status(), RunStatus::Succeeded);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_run_tolerates_a_missing_execution(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .delete_pipeline(&workspace(), run.id())
        .await
        .expect("engine-side delete");

    stack
        .service
        .delete_pipeline_run(&workspace(), run.id())
        .await
        .expect("delete succeeds");

    let err = stack
        .service
        .get_pipeline_run(&workspace(), &run.id().to_string())
        .await
        .expect_err("run removed");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_pipeline_removes_runs_and_executions(stack: Stack) {
    let first = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("first submission");
    let second = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("second submission");

    stack
        .service
        .delete_pipeline(&workspace(), first.pipeline_id())
        .await
        .expect("delete succeeds");

    for run_id in [first.id(), second.id()] {
        assert!(
            stack
                .repository
                .get_pipeline_run(&run_id.to_string())
                .await
                .expect("lookup succeeds")
                .is_none()
        );
        assert!(stack.engine.execution_labels(run_id).expect("readable").is_none());
    }
    assert!(
        stack
            .repository
            .find_pipeline(first.pipeline_id())
            .await
            .expect("lookup succeeds")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_reconciles_and_respects_the_limit(stack: Stack) {
    let mut ids = Vec::new();
    for name in ["web", "api", "worker"] {
        let run = stack
            .service
            .run_pipeline(config(name))
            .await
            .expect("submission succeeds");
        ids.push(run.id());
    }
    for run_id in &ids {
        stack
            .engine
            .set_condition(*run_id, EngineCondition::running())
            .expect("engine update");
    }

    let listed = stack
        .service
        .list_pipelines(&workspace(), &project(), None)
        .await
        .expect("list succeeds");
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|run| run.status() == RunStatus::Running));

    let limited = stack
        .service
        .list_pipelines(&workspace(), &project(), Some(2))
        .await
        .expect("list succeeds");
    assert_eq!(limited.len(), 2);

    let elsewhere = stack
        .service
        .list_pipelines(
            &WorkspaceId::new("ws-beta").expect("valid workspace"),
            &project(),
            None,
        )
        .await
        .expect("list succeeds");
    assert!(elsewhere.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retry_submits_the_stored_config_as_a_new_run(stack: Stack) {
    let original = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .set_condition(original.id(), EngineCondition::failed("exit 2"))
        .expect("engine update");

    let retried = stack
        .service
        .retry_pipeline(&workspace(), original.provider_run_name().expect("named"))
        .await
        .expect("retry succeeds");

    assert_ne!(retried.id(), original.id());
    assert_eq!(retried.pipeline_id(), original.pipeline_id());
    assert_eq!(retried.status(), RunStatus::Pending);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runs_are_found_by_backend_name(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");

    let found = stack
        .service
        .get_pipeline_run(&workspace(), run.provider_run_name().expect("named"))
        .await
        .expect("lookup by backend name");

    assert_eq!(found.id(), run.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_status_reports_the_engine(stack: Stack) {
    let status = stack
        .service
        .provider_status(&workspace())
        .await
        .expect("status read");
    assert!(status.healthy);
    assert_eq!(status.version, stack.engine.version());

    stack.engine.set_available(false).expect("toggle engine");
    let down = stack
        .service
        .provider_status(&workspace())
        .await
        .expect("status read");
    assert!(!down.healthy);
}
