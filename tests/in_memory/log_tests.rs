//! Bulk log reads and live log streaming.

use super::helpers::{Stack, TestLogs, config, stack, workspace};
use futures::StreamExt;
use mockable::{Clock, DefaultClock};
use pipeline_control::pipeline::{
    adapters::engine::EngineCondition,
    domain::{ErrorKind, LogEntry, RunId},
    services::{LogAccessService, PipelineServiceError},
};
use rstest::rstest;
use std::sync::Arc;
use tokio::sync::oneshot;

fn line(stage: &str, message: &str) -> LogEntry {
    LogEntry::info(DefaultClock.utc(), stage, "step", message)
}

async fn running_run(stack: &Stack) -> RunId {
    let run = stack
        .service
        .run_pipeline(config("web"))
        .await
        .expect("submission succeeds");
    stack
        .engine
        .set_condition(run.id(), EngineCondition::running())
        .expect("engine update");
    run.id()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bulk_read_keeps_the_most_recent_lines(stack: Stack) {
    let run_id = running_run(&stack).await;
    for message in ["one", "two", "three"] {
        stack
            .engine
            .append_log(run_id, line("clone", message))
            .expect("log appended");
    }
    let bounded: TestLogs =
        LogAccessService::new(Arc::clone(&stack.repository), stack.service.resolver(), 2);

    let entries = bounded
        .get_logs(&workspace(), run_id, "clone")
        .await
        .expect("logs read");

    let messages: Vec<&str> = entries.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, ["two", "three"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_stage_and_run_are_not_found(stack: Stack) {
    let run_id = running_run(&stack).await;

    let missing_stage = stack
        .logs
        .get_logs(&workspace(), run_id, "deploy")
        .await
        .expect_err("no deploy pod");
    assert_eq!(missing_stage.kind(), ErrorKind::NotFound);

    let missing_run = stack
        .logs
        .get_logs(&workspace(), RunId::new(), "clone")
        .await
        .expect_err("no such run");
    assert!(matches!(missing_run, PipelineServiceError::RunNotFound(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stream_ends_when_the_run_is_cancelled(stack: Stack) {
    let run_id = running_run(&stack).await;
    stack
        .engine
        .append_log(run_id, line("clone", "cloning"))
        .expect("log appended");

    let mut stream = stack
        .logs
        .stream_logs(&workspace(), run_id, "clone")
        .await
        .expect("stream opened");
    let first = stream.next().await.expect("backlog").expect("ok line");
    assert!(String::from_utf8_lossy(&first).contains("cloning"));

    stack
        .service
        .cancel_pipeline(&workspace(), run_id)
        .await
        .expect("cancel succeeds");

    assert!(stream.next().await.is_none());
    drop(stream);
    assert_eq!(stack.engine.open_stream_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_signal_closes_the_stream(stack: Stack) {
    let run_id = running_run(&stack).await;
    stack
        .engine
        .append_log(run_id, line("clone", "cloning"))
        .expect("log appended");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let mut stream = stack
        .logs
        .stream_logs_until(&workspace(), run_id, "clone", async move {
            let _signal = shutdown_rx.await;
        })
        .await
        .expect("stream opened");
    stream.next().await.expect("backlog").expect("ok line");
    assert_eq!(stack.engine.open_stream_count(), 1);

    shutdown_tx.send(()).expect("receiver alive");

    assert!(stream.next().await.is_none());
    assert_eq!(stack.engine.open_stream_count(), 0);
    stack
        .engine
        .append_log(run_id, line("clone", "after shutdown"))
        .expect("log appended");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dropping_a_stream_releases_the_connection(stack: Stack) {
    let run_id = running_run(&stack).await;
    stack
        .engine
        .append_log(run_id, line("clone", "cloning"))
        .expect("log appended");

    let stream = stack
        .logs
        .stream_logs(&workspace(), run_id, "clone")
        .await
        .expect("stream opened");
    assert_eq!(stack.engine.open_stream_count(), 1);

    stream.close();

    assert_eq!(stack.engine.open_stream_count(), 0);
}
