//! Concurrent submissions and status reads.

use super::helpers::{Stack, config, project, stack, workspace};
use pipeline_control::pipeline::{
    adapters::engine::EngineCondition, domain::RunStatus, ports::PipelineRepository,
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_submissions_share_one_pipeline(stack: Stack) {
    let (left, right) = tokio::join!(
        stack.service.run_pipeline(config("web")),
        stack.service.run_pipeline(config("web")),
    );
    let first = left.expect("first submission");
    let second = right.expect("second submission");

    assert_ne!(first.id(), second.id());
    assert_ne!(first.provider_run_name(), second.provider_run_name());
    assert_eq!(first.pipeline_id(), second.pipeline_id());
    let pipelines = stack
        .repository
        .list_pipelines(&workspace(), &project())
        .await
        .expect("list succeeds");
    assert_eq!(pipelines.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_runs_of_different_pipelines_stay_separate(stack: Stack) {
    let (web, api) = tokio::join!(
        stack.service.run_pipeline(config("web")),
        stack.service.run_pipeline(config("api")),
    );
    let web = web.expect("web submission");
    let api = api.expect("api submission");

    assert_ne!(web.pipeline_id(), api.pipeline_id());
    assert_ne!(web.provider_run_name(), api.provider_run_name());
    let ws = workspace();
    let (web_status, api_status) = tokio::join!(
        stack.service.get_status(&ws, web.id()),
        stack.service.get_status(&ws, api.id()),
    );
    assert_eq!(web_status.expect("web status").pipeline_id(), web.pipeline_id());
    assert_eq!(api_status.expect("api status").pipeline_id(), api.pipeline_id());

    let mut names: Vec<String> = stack
        .repository
        .list_pipelines(&ws, &project())
        .await
        .expect("list succeeds")
        .iter()
        .map(|pipeline| pipeline.name().to_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["api", "web"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_reads_and_cancel_keep_the_terminal_state(stack: Stack) {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .set_condition(run.id(), EngineCondition::succeeded())
        .expect("engine update");

    let ws = workspace();
    let (left, right, cancel) = tokio::join!(
        stack.service.get_status(&ws, run.id()),
        stack.service.get_status(&ws, run.id()),
        stack.service.cancel_pipeline(&ws, run.id()),
    );
    left.expect("first read");
    right.expect("second read");
    cancel.expect("cancel tolerated");

    let stored = stack
        .repository
        .get_pipeline_run(&run.id().to_string())
        .await
        .expect("lookup succeeds")
        .expect("run stored");
    assert_eq!(stored.status(), RunStatus::Succeeded);
}
