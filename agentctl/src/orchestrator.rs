//! Execution orchestrator
//!
//! Coordinates a submission with the local worker lifecycle: queue
//! acquisition, supervised worker startup, attach readiness, output
//! streaming, and coordinated shutdown. Also drives the multi-queue
//! fan-out used to run one submission across several targets at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use controlplane::entities::{
    AgentExecution, ExecuteAgentRequest, ExecuteTeamRequest, ExecutionEnvironmentOverride,
};
use controlplane::StreamEventType;
use shared::{component_info, ComponentId};

use crate::error::{CliError, CliResult};
use crate::services::queue_manager::{EphemeralQueueManager, QueueManagerConfig};
use crate::traits::{ControlPlaneApi, OutputSink, WorkerRunner};

/// Extra time allowed for a cancelled worker to wind down
const CANCELLED_WORKER_GRACE: Duration = Duration::from_secs(2);

/// What to execute and how
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub target: ExecutionTarget,
    pub prompt: String,
    pub parent_execution_id: Option<String>,
    pub environment: Option<ExecutionEnvironmentOverride>,
}

#[derive(Debug, Clone)]
pub enum ExecutionTarget {
    Agent(String),
    Team(String),
}

/// Queue selection for a submission
#[derive(Debug, Clone)]
pub enum QueueSelector {
    /// Let the backend pick a healthy queue
    Auto,
    Ids(Vec<String>),
    Names(Vec<String>),
}

/// Per-target outcome of a multi-queue run
#[derive(Debug)]
pub struct QueueExecutionResult {
    pub queue_id: String,
    pub queue_name: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<CliError>,
}

/// Aggregate of a multi-queue run, sorted ascending by duration
#[derive(Debug)]
pub struct MultiQueueSummary {
    pub results: Vec<QueueExecutionResult>,
    pub success_count: usize,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Environment that hosts ephemeral queues for local runs
    pub environment_id: String,
    /// How long a single-execution worker gets to exit on its own
    pub worker_exit_grace: Duration,
    pub queue: QueueManagerConfig,
}

impl OrchestratorConfig {
    pub fn new(environment_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            // Covers the worker runtime's own polling cadence plus stream teardown
            worker_exit_grace: Duration::from_secs(20),
            queue: QueueManagerConfig::default(),
        }
    }
}

/// Top-level coordinator for agent and team executions
pub struct ExecutionOrchestrator<C, S, W>
where
    C: ControlPlaneApi + 'static,
    S: OutputSink + 'static,
    W: WorkerRunner + 'static,
{
    client: Arc<C>,
    sink: Arc<S>,
    runner: Arc<W>,
    config: OrchestratorConfig,
}

impl<C, S, W> ExecutionOrchestrator<C, S, W>
where
    C: ControlPlaneApi + 'static,
    S: OutputSink + 'static,
    W: WorkerRunner + 'static,
{
    pub fn new(
        client: Arc<C>,
        sink: Arc<S>,
        runner: Arc<W>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            client,
            sink,
            runner,
            config,
        }
    }

    /// Resolve a queue selector into concrete queue IDs
    ///
    /// IDs are validated against the control plane; names go through a
    /// name-to-ID map built from the full queue listing.
    pub async fn resolve_queue_ids(&self, selector: &QueueSelector) -> CliResult<Vec<String>> {
        match selector {
            QueueSelector::Auto => Ok(Vec::new()),
            QueueSelector::Ids(ids) => {
                for id in ids {
                    self.client
                        .get_worker_queue(id)
                        .await
                        .map_err(|e| CliError::InvalidQueue {
                            id: id.clone(),
                            message: e.to_string(),
                        })?;
                }
                Ok(ids.clone())
            }
            QueueSelector::Names(names) => {
                let queues = self.client.list_worker_queues().await?;
                let by_name: HashMap<&str, &str> = queues
                    .iter()
                    .map(|q| (q.name.as_str(), q.id.as_str()))
                    .collect();

                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    let id = by_name
                        .get(name.as_str())
                        .ok_or_else(|| CliError::QueueNotFound { name: name.clone() })?;
                    ids.push((*id).to_string());
                }
                Ok(ids)
            }
        }
    }

    /// Submit against the selected queues and stream the output
    ///
    /// More than one resolved queue fans the submission out in parallel.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        selector: &QueueSelector,
    ) -> CliResult<()> {
        let ids = self.resolve_queue_ids(selector).await?;
        if ids.len() > 1 {
            return self.execute_multi(request, ids).await;
        }

        let cancel = CancellationToken::new();
        let force = CancellationToken::new();
        let signals = spawn_signal_watcher(cancel.clone(), force.clone());

        let queue_id = ids.first().map(String::as_str);
        let result = tokio::select! {
            result = Self::submit_and_stream(&self.client, &self.sink, request, queue_id, &cancel) => result,
            _ = force.cancelled() => Err(CliError::ForceTerminated),
        };

        signals.abort();
        result
    }

    /// Run the submission on this machine via an ephemeral local worker
    ///
    /// First SIGINT/SIGTERM cancels in-flight work but still releases the
    /// queue; a second SIGINT abandons cleanup and returns immediately.
    pub async fn execute_local(&self, request: &ExecutionRequest) -> CliResult<()> {
        let cancel = CancellationToken::new();
        let force = CancellationToken::new();
        let signals = spawn_signal_watcher(cancel.clone(), force.clone());

        let queue_manager = EphemeralQueueManager::new(
            self.client.clone(),
            self.config.environment_id.clone(),
        )
        .with_config(self.config.queue.clone());

        self.sink.notice("creating ephemeral worker queue...");
        let queue = match queue_manager.acquire().await {
            Ok(queue) => queue,
            Err(e) => {
                signals.abort();
                return Err(e);
            }
        };
        self.sink.notice(&format!("queue created: {}", queue.id));

        self.sink.notice("starting local worker...");
        let worker_cancel = cancel.child_token();
        let mut worker = {
            let runner = self.runner.clone();
            let queue_id = queue.id.clone();
            tokio::spawn(async move { runner.run(&queue_id, worker_cancel).await })
        };

        self.sink
            .notice("waiting for worker to be ready (first runs may install dependencies)...");
        let started = Instant::now();
        let (outcome, grace) = match queue_manager.wait_for_attach(&queue.id, &cancel).await {
            // Never submitted, so there is nothing to wait out
            Err(e) => (Err(e), Duration::ZERO),
            Ok(()) => {
                self.sink
                    .notice(&format!("worker ready ({}s)", started.elapsed().as_secs()));
                let result = Self::submit_and_stream(
                    &self.client,
                    &self.sink,
                    request,
                    Some(&queue.id),
                    &cancel,
                )
                .await;
                (result, self.config.worker_exit_grace)
            }
        };

        let worker_result = tokio::select! {
            worker_result = Self::wind_down(&queue_manager, &cancel, &mut worker, grace) => worker_result,
            _ = force.cancelled() => {
                signals.abort();
                return Err(CliError::ForceTerminated);
            }
        };
        signals.abort();

        match (outcome, worker_result) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(Err(worker_err))) if !matches!(worker_err, CliError::Interrupted) => {
                Err(worker_err)
            }
            (Ok(()), _) => Ok(()),
        }
    }

    /// Give the worker its grace period, cancel what is left, release the queue
    async fn wind_down(
        queue_manager: &EphemeralQueueManager<C>,
        cancel: &CancellationToken,
        worker: &mut JoinHandle<CliResult<()>>,
        grace: Duration,
    ) -> Option<CliResult<()>> {
        let worker_result = match tokio::time::timeout(grace, &mut *worker).await {
            Ok(joined) => joined.ok(),
            Err(_) => {
                // The worker did not exit on its own; stop it
                cancel.cancel();
                match tokio::time::timeout(CANCELLED_WORKER_GRACE, &mut *worker).await {
                    Ok(joined) => joined.ok(),
                    Err(_) => {
                        worker.abort();
                        None
                    }
                }
            }
        };
        cancel.cancel();
        queue_manager.release().await;
        worker_result
    }

    /// Fan the submission out across every target queue and aggregate
    async fn execute_multi(
        &self,
        request: &ExecutionRequest,
        queue_ids: Vec<String>,
    ) -> CliResult<()> {
        let total = queue_ids.len();
        self.sink
            .notice(&format!("executing across {total} queues"));

        let cancel = CancellationToken::new();
        let force = CancellationToken::new();
        let signals = spawn_signal_watcher(cancel.clone(), force.clone());

        let summary = tokio::select! {
            summary = self.run_multi(request, &queue_ids, &cancel) => summary,
            _ = force.cancelled() => {
                signals.abort();
                return Err(CliError::ForceTerminated);
            }
        };
        signals.abort();

        for result in &summary.results {
            if result.success {
                self.sink.notice(&format!(
                    "  ok {}: completed in {:.1}s",
                    result.queue_name,
                    result.duration.as_secs_f64()
                ));
            } else {
                let message = result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                self.sink
                    .notice(&format!("  failed {}: {message}", result.queue_name));
            }
        }
        self.sink
            .notice(&format!("{}/{} succeeded", summary.success_count, total));

        if summary.success_count < total {
            return Err(CliError::MultiQueueFailed {
                failed: total - summary.success_count,
            });
        }
        Ok(())
    }

    /// Run one submission per target concurrently and collect every outcome
    ///
    /// Results land in a channel bounded to the target count; no ordering
    /// is guaranteed between targets until the final duration sort.
    pub async fn run_multi(
        &self,
        request: &ExecutionRequest,
        queue_ids: &[String],
        cancel: &CancellationToken,
    ) -> MultiQueueSummary {
        let total = queue_ids.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        let mut names = Vec::with_capacity(total);
        for queue_id in queue_ids {
            let name = match self.client.get_worker_queue(queue_id).await {
                Ok(queue) => queue.name,
                Err(_) => queue_id.clone(),
            };
            self.sink.notice(&format!("  - {name}"));
            names.push(name);
        }

        let mut tasks = Vec::with_capacity(total);
        for (queue_id, queue_name) in queue_ids.iter().cloned().zip(names) {
            let tx = tx.clone();
            let client = self.client.clone();
            let sink = self.sink.clone();
            let request = request.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let start = Instant::now();
                let result =
                    Self::submit_and_stream(&client, &sink, &request, Some(&queue_id), &cancel)
                        .await;
                let outcome = QueueExecutionResult {
                    queue_id,
                    queue_name,
                    success: result.is_ok(),
                    duration: start.elapsed(),
                    error: result.err(),
                };
                let _ = tx.send(outcome).await;
            }));
        }
        drop(tx);

        for task in tasks {
            let _ = task.await;
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        results.sort_by_key(|r| r.duration);
        let success_count = results.iter().filter(|r| r.success).count();
        MultiQueueSummary {
            results,
            success_count,
        }
    }

    async fn submit(
        client: &Arc<C>,
        request: &ExecutionRequest,
        queue_id: Option<&str>,
    ) -> CliResult<AgentExecution> {
        let worker_queue_id = queue_id.map(str::to_string);
        let execution = match &request.target {
            ExecutionTarget::Agent(agent_id) => {
                let req = ExecuteAgentRequest {
                    prompt: request.prompt.clone(),
                    worker_queue_id,
                    parent_execution_id: request.parent_execution_id.clone(),
                    system_prompt: None,
                    stream: Some(true),
                    execution_environment: request.environment.clone(),
                };
                client.execute_agent(agent_id, req).await?
            }
            ExecutionTarget::Team(team_id) => {
                let req = ExecuteTeamRequest {
                    prompt: request.prompt.clone(),
                    worker_queue_id,
                    parent_execution_id: request.parent_execution_id.clone(),
                    stream: Some(true),
                    execution_environment: request.environment.clone(),
                };
                client.execute_team(team_id, req).await?
            }
        };
        Ok(execution)
    }

    async fn submit_and_stream(
        client: &Arc<C>,
        sink: &Arc<S>,
        request: &ExecutionRequest,
        queue_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> CliResult<()> {
        let execution = tokio::select! {
            execution = Self::submit(client, request, queue_id) => execution?,
            _ = cancel.cancelled() => return Err(CliError::Interrupted),
        };
        let execution_id = execution.id().to_string();
        component_info!(ComponentId::current(), "execution {execution_id} submitted");

        Self::stream_output(client, sink, &execution_id, cancel).await
    }

    async fn stream_output(
        client: &Arc<C>,
        sink: &Arc<S>,
        execution_id: &str,
        cancel: &CancellationToken,
    ) -> CliResult<()> {
        let mut events = tokio::select! {
            events = client.stream_execution_output(execution_id) => {
                events.map_err(|e| CliError::StreamingFailed { message: e.to_string() })?
            }
            _ = cancel.cancelled() => return Err(CliError::Interrupted),
        };

        let mut stream_started = false;
        loop {
            let item = tokio::select! {
                item = events.recv() => item,
                _ = cancel.cancelled() => return Err(CliError::Interrupted),
            };

            let Some(item) = item else {
                if stream_started {
                    return Ok(());
                }
                // Stream closed before any event: fall back to the recorded result
                return Self::fetch_final_response(client, sink, execution_id).await;
            };

            let event = item.map_err(|e| CliError::StreamingFailed {
                message: e.to_string(),
            })?;
            stream_started = true;

            match event.event_type {
                StreamEventType::Chunk => sink.chunk(&event.content),
                StreamEventType::Status => {
                    if let Some(status) = &event.status {
                        sink.status(status);
                    }
                }
                StreamEventType::Error => {
                    return Err(CliError::ExecutionFailed {
                        message: event.content,
                    })
                }
                StreamEventType::Complete => return Ok(()),
            }
        }
    }

    async fn fetch_final_response(
        client: &Arc<C>,
        sink: &Arc<S>,
        execution_id: &str,
    ) -> CliResult<()> {
        let execution =
            client
                .get_execution(execution_id)
                .await
                .map_err(|e| CliError::StreamingFailed {
                    message: format!(
                        "stream closed without events and fetching the final result failed: {e}"
                    ),
                })?;
        match execution.response {
            Some(response) if !response.is_empty() => {
                sink.chunk(&response);
                Ok(())
            }
            _ => Err(CliError::StreamingFailed {
                message: "stream closed before any output was received".to_string(),
            }),
        }
    }
}

/// First SIGINT/SIGTERM cancels in-flight work; a second SIGINT forces exit
fn spawn_signal_watcher(cancel: CancellationToken, force: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            force.cancel();
        }
    })
}

/// Resolve on SIGINT, and on SIGTERM where available
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
