//! Test helpers: stub runners, a collecting sink, and mock plumbing

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agentctl::error::CliResult;
use agentctl::orchestrator::{OrchestratorConfig, QueueExecutionResult};
use agentctl::services::QueueManagerConfig;
use agentctl::traits::{OutputSink, WorkerRunner};
use controlplane::{ControlPlaneResult, StreamEvent};

use super::fixtures::TestFixtures;

/// Orchestrator config with short timings suitable for tests
pub fn fast_orchestrator_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::new(TestFixtures::ENVIRONMENT);
    config.worker_exit_grace = Duration::from_millis(300);
    config.queue = QueueManagerConfig {
        queue_ttl_seconds: 300,
        attach_poll_interval: Duration::from_millis(20),
        attach_timeout: Duration::from_millis(150),
        release_attempts: 3,
        release_retry_delay: Duration::from_millis(10),
    };
    config
}

/// Sink that records everything it is given
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub chunks: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
    pub notices: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn collected_output(&self) -> String {
        self.chunks.lock().unwrap().join("")
    }
}

impl OutputSink for CollectingSink {
    fn chunk(&self, text: &str) {
        self.chunks.lock().unwrap().push(text.to_string());
    }

    fn status(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

/// Worker that self-terminates after a short delay, like a single-execution
/// runtime that finished its task
pub struct SelfTerminatingRunner {
    pub delay: Duration,
}

#[async_trait]
impl WorkerRunner for SelfTerminatingRunner {
    async fn run(&self, _queue_id: &str, cancel: CancellationToken) -> CliResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => {}
        }
        Ok(())
    }
}

/// Worker that only exits when cancelled
pub struct IdleRunner;

#[async_trait]
impl WorkerRunner for IdleRunner {
    async fn run(&self, _queue_id: &str, cancel: CancellationToken) -> CliResult<()> {
        cancel.cancelled().await;
        Ok(())
    }
}

/// Build a ready-to-drain stream receiver from canned events
pub fn stream_of(events: Vec<StreamEvent>) -> mpsc::Receiver<ControlPlaneResult<StreamEvent>> {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        tx.try_send(Ok(event)).expect("stream channel too small");
    }
    rx
}

/// A stream that closes without ever emitting an event
pub fn empty_stream() -> mpsc::Receiver<ControlPlaneResult<StreamEvent>> {
    let (_tx, rx) = mpsc::channel(1);
    rx
}

/// Assert that multi-queue results are sorted ascending by duration
pub fn assert_sorted_by_duration(results: &[QueueExecutionResult]) {
    for pair in results.windows(2) {
        assert!(
            pair[0].duration <= pair[1].duration,
            "results are not sorted by duration"
        );
    }
}
