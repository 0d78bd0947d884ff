//! End-to-end scenarios for the execution orchestrator
//!
//! These drive the full orchestrator against a mocked control plane and
//! stub worker runners: the local ephemeral-queue lifecycle, attach
//! timeouts, multi-queue fan-out, and stream fallback behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use agentctl::error::CliError;
use agentctl::orchestrator::{ExecutionOrchestrator, QueueSelector};
use agentctl::traits::MockControlPlaneApi;
use controlplane::entities::{AgentExecution, ExecutionStatus};
use controlplane::{ControlPlaneError, StreamEvent};

use common::*;

/// Scenario: local run where the worker registers within one poll tick and
/// the execution completes in a single chunk
#[tokio::test]
async fn test_local_run_streams_one_chunk_and_deletes_the_queue_once() {
    let mut api = MockControlPlaneApi::new();
    api.expect_create_worker_queue()
        .times(1)
        .returning(|_, req| Ok(TestFixtures::queue("eq-1", &req.name)));
    // The worker registers on the first poll; by cleanup time it is gone
    api.expect_list_queue_workers()
        .times(1)
        .returning(|_| Ok(vec![TestFixtures::worker("w-1")]));
    api.expect_list_queue_workers().returning(|_| Ok(vec![]));
    api.expect_execute_agent()
        .withf(|agent, req| {
            agent == TestFixtures::AGENT && req.worker_queue_id.as_deref() == Some("eq-1")
        })
        .times(1)
        .returning(|_, _| Ok(TestFixtures::execution("exec-1")));
    api.expect_stream_execution_output()
        .times(1)
        .returning(|_| Ok(stream_of(TestFixtures::one_chunk_stream("hello world"))));
    api.expect_delete_worker_queue()
        .times(1)
        .returning(|_| Ok(()));

    let sink = Arc::new(CollectingSink::default());
    let runner = Arc::new(SelfTerminatingRunner {
        delay: Duration::from_millis(50),
    });
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink.clone(),
        runner,
        fast_orchestrator_config(),
    );

    let result = orchestrator
        .execute_local(&TestFixtures::agent_request("do the thing"))
        .await;
    assert!(result.is_ok(), "local run failed: {:?}", result.err());
    assert_eq!(sink.collected_output(), "hello world");
}

/// Scenario: the worker never registers, so the run times out without ever
/// submitting, and the queue is still cleaned up
#[tokio::test]
async fn test_local_run_times_out_when_no_worker_registers() {
    let mut api = MockControlPlaneApi::new();
    api.expect_create_worker_queue()
        .times(1)
        .returning(|_, req| Ok(TestFixtures::queue("eq-2", &req.name)));
    api.expect_list_queue_workers().returning(|_| Ok(vec![]));
    api.expect_execute_agent().times(0);
    api.expect_execute_team().times(0);
    api.expect_stream_execution_output().times(0);
    api.expect_delete_worker_queue()
        .times(1)
        .returning(|_| Ok(()));

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink,
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let result = orchestrator
        .execute_local(&TestFixtures::agent_request("never runs"))
        .await;
    assert!(matches!(result, Err(CliError::WorkerAttachTimeout { .. })));
}

/// Scenario: three targets, one failing submission. All outcomes are
/// reported, sorted by duration, and the aggregate call fails.
#[tokio::test]
async fn test_multi_queue_reports_every_outcome_and_counts_failures() {
    let mut api = MockControlPlaneApi::new();
    api.expect_get_worker_queue()
        .returning(|id| Ok(TestFixtures::queue(id, &format!("name-{id}"))));
    api.expect_execute_agent()
        .returning(|_, req| match req.worker_queue_id.as_deref() {
            Some("q2") => Err(ControlPlaneError::Http {
                status: 500,
                message: "worker pool exhausted".to_string(),
            }),
            other => Ok(TestFixtures::execution(&format!(
                "exec-{}",
                other.unwrap_or("auto")
            ))),
        });
    api.expect_stream_execution_output()
        .returning(|_| Ok(stream_of(vec![StreamEvent::complete()])));

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink.clone(),
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let ids = vec!["q1".to_string(), "q2".to_string(), "q3".to_string()];
    let cancel = CancellationToken::new();
    let summary = orchestrator
        .run_multi(&TestFixtures::agent_request("fan out"), &ids, &cancel)
        .await;

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.success_count, 2);
    assert_sorted_by_duration(&summary.results);

    let failed: Vec<_> = summary.results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].queue_id, "q2");

    // The aggregate call surfaces the failure count in its error
    let result = orchestrator
        .execute(
            &TestFixtures::agent_request("fan out"),
            &QueueSelector::Ids(ids),
        )
        .await;
    match result {
        Err(e) => assert_eq!(e.to_string(), "1 executions failed"),
        Ok(()) => panic!("expected the aggregate call to fail"),
    }
}

/// All targets succeeding makes the aggregate call succeed
#[tokio::test]
async fn test_multi_queue_succeeds_when_every_target_succeeds() {
    let mut api = MockControlPlaneApi::new();
    api.expect_get_worker_queue()
        .returning(|id| Ok(TestFixtures::queue(id, &format!("name-{id}"))));
    api.expect_execute_agent()
        .returning(|_, _| Ok(TestFixtures::execution("exec-ok")));
    api.expect_stream_execution_output()
        .returning(|_| Ok(stream_of(vec![StreamEvent::complete()])));

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink,
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let ids = vec!["q1".to_string(), "q2".to_string()];
    let result = orchestrator
        .execute(
            &TestFixtures::agent_request("fan out"),
            &QueueSelector::Ids(ids),
        )
        .await;
    assert!(result.is_ok());
}

/// A stream that closes without events falls back to the recorded response
#[tokio::test]
async fn test_closed_stream_falls_back_to_the_final_result() {
    let mut api = MockControlPlaneApi::new();
    api.expect_execute_agent()
        .returning(|_, _| Ok(TestFixtures::execution("exec-quiet")));
    api.expect_stream_execution_output()
        .returning(|_| Ok(empty_stream()));
    api.expect_get_execution()
        .times(1)
        .returning(|id| {
            Ok(AgentExecution {
                id: Some(id.to_string()),
                execution_id: None,
                status: ExecutionStatus::Completed,
                response: Some("recorded response".to_string()),
                created_at: None,
            })
        });

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink.clone(),
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let result = orchestrator
        .execute(&TestFixtures::agent_request("quiet"), &QueueSelector::Auto)
        .await;
    assert!(result.is_ok());
    assert_eq!(sink.collected_output(), "recorded response");
}

/// A closed stream with no recorded response is a streaming failure
#[tokio::test]
async fn test_closed_stream_with_empty_result_fails() {
    let mut api = MockControlPlaneApi::new();
    api.expect_execute_agent()
        .returning(|_, _| Ok(TestFixtures::execution("exec-empty")));
    api.expect_stream_execution_output()
        .returning(|_| Ok(empty_stream()));
    api.expect_get_execution().returning(|id| {
        Ok(AgentExecution {
            id: Some(id.to_string()),
            execution_id: None,
            status: ExecutionStatus::Completed,
            response: None,
            created_at: None,
        })
    });

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink,
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let result = orchestrator
        .execute(&TestFixtures::agent_request("empty"), &QueueSelector::Auto)
        .await;
    assert!(matches!(result, Err(CliError::StreamingFailed { .. })));
}

/// An error event from the stream becomes the command's failure
#[tokio::test]
async fn test_error_event_fails_the_execution() {
    let mut api = MockControlPlaneApi::new();
    api.expect_execute_agent()
        .returning(|_, _| Ok(TestFixtures::execution("exec-err")));
    api.expect_stream_execution_output().returning(|_| {
        Ok(stream_of(vec![StreamEvent {
            event_type: controlplane::StreamEventType::Error,
            content: "tool crashed".to_string(),
            status: None,
        }]))
    });

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink,
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let result = orchestrator
        .execute(&TestFixtures::agent_request("boom"), &QueueSelector::Auto)
        .await;
    match result {
        Err(CliError::ExecutionFailed { message }) => assert_eq!(message, "tool crashed"),
        other => panic!("expected an execution failure, got {other:?}"),
    }
}

/// Queue names resolve through the listing; unknown names are an error
#[tokio::test]
async fn test_queue_names_resolve_against_the_listing() {
    let mut api = MockControlPlaneApi::new();
    api.expect_list_worker_queues().returning(|| {
        Ok(vec![
            TestFixtures::queue("q-aa", "alpha"),
            TestFixtures::queue("q-bb", "beta"),
        ])
    });

    let sink = Arc::new(CollectingSink::default());
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(api),
        sink,
        Arc::new(IdleRunner),
        fast_orchestrator_config(),
    );

    let ids = orchestrator
        .resolve_queue_ids(&QueueSelector::Names(vec![
            "beta".to_string(),
            "alpha".to_string(),
        ]))
        .await
        .unwrap();
    assert_eq!(ids, vec!["q-bb".to_string(), "q-aa".to_string()]);

    let missing = orchestrator
        .resolve_queue_ids(&QueueSelector::Names(vec!["gamma".to_string()]))
        .await;
    assert!(matches!(missing, Err(CliError::QueueNotFound { .. })));
}
