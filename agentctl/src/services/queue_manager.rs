//! Lifecycle management for server-side ephemeral worker queues
//!
//! One manager owns one queue for the duration of a local run: create it,
//! wait for a worker to attach, and tear it down exactly once no matter how
//! many shutdown paths race to do so. Teardown is never fatal; the server's
//! TTL is the backstop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use controlplane::entities::{WorkerQueue, WorkerQueueCreateRequest};
use shared::{component_info, component_warn, ComponentId};

use crate::error::{CliError, CliResult};
use crate::traits::ControlPlaneApi;

/// Tunables for queue lifecycle management
#[derive(Debug, Clone)]
pub struct QueueManagerConfig {
    /// Server-side safety net, independent of client-driven cleanup
    pub queue_ttl_seconds: u64,
    pub attach_poll_interval: Duration,
    pub attach_timeout: Duration,
    pub release_attempts: u32,
    pub release_retry_delay: Duration,
}

impl Default for QueueManagerConfig {
    fn default() -> Self {
        Self {
            queue_ttl_seconds: 300,
            attach_poll_interval: Duration::from_secs(2),
            attach_timeout: Duration::from_secs(180),
            release_attempts: 5,
            release_retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct CleanupState {
    queue_id: Option<String>,
    done: bool,
}

/// Owns one ephemeral execution queue for the lifetime of a run
pub struct EphemeralQueueManager<C: ControlPlaneApi> {
    client: Arc<C>,
    environment_id: String,
    config: QueueManagerConfig,
    cleanup: Mutex<CleanupState>,
}

impl<C: ControlPlaneApi> EphemeralQueueManager<C> {
    pub fn new(client: Arc<C>, environment_id: impl Into<String>) -> Self {
        Self {
            client,
            environment_id: environment_id.into(),
            config: QueueManagerConfig::default(),
            cleanup: Mutex::new(CleanupState::default()),
        }
    }

    pub fn with_config(mut self, config: QueueManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the server-side ephemeral queue backing one local run
    pub async fn acquire(&self) -> CliResult<WorkerQueue> {
        let short_id = Uuid::new_v4().to_string();
        let name = format!(
            "local-exec-{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            &short_id[..8]
        );
        let req = WorkerQueueCreateRequest {
            name,
            environment_id: self.environment_id.clone(),
            ephemeral: Some(true),
            single_execution_mode: Some(true),
            auto_cleanup_after_seconds: Some(self.config.queue_ttl_seconds),
        };

        let queue = self
            .client
            .create_worker_queue(&self.environment_id, req)
            .await
            .map_err(|e| CliError::QueueCreateFailed {
                message: e.to_string(),
            })?;

        self.cleanup.lock().await.queue_id = Some(queue.id.clone());
        component_info!(ComponentId::current(), "created ephemeral queue {}", queue.id);
        Ok(queue)
    }

    /// Poll until at least one worker has registered against the queue
    pub async fn wait_for_attach(
        &self,
        queue_id: &str,
        cancel: &CancellationToken,
    ) -> CliResult<()> {
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.attach_poll_interval) => {}
                _ = cancel.cancelled() => return Err(CliError::Interrupted),
            }

            if start.elapsed() >= self.config.attach_timeout {
                return Err(CliError::WorkerAttachTimeout {
                    elapsed: start.elapsed(),
                });
            }

            polls += 1;
            if let Ok(workers) = self.client.list_queue_workers(queue_id).await {
                if !workers.is_empty() {
                    return Ok(());
                }
            }

            if polls % 5 == 0 {
                component_info!(
                    ComponentId::current(),
                    "still waiting for a worker ({}s elapsed)",
                    start.elapsed().as_secs()
                );
            }
        }
    }

    /// Idempotent teardown; safe to race from multiple shutdown paths
    ///
    /// Deletion is skipped while a worker is still registered; after the
    /// attempt budget is spent the server-side TTL takes over.
    pub async fn release(&self) {
        let queue_id = {
            let mut cleanup = self.cleanup.lock().await;
            if cleanup.done {
                return;
            }
            cleanup.done = true;
            match cleanup.queue_id.clone() {
                Some(id) => id,
                None => return,
            }
        };

        for attempt in 1..=self.config.release_attempts {
            match self.client.list_queue_workers(&queue_id).await {
                Ok(workers) if !workers.is_empty() => {
                    component_info!(
                        ComponentId::current(),
                        "worker still attached to {queue_id}, delaying cleanup (attempt {attempt}/{})",
                        self.config.release_attempts
                    );
                    tokio::time::sleep(self.config.release_retry_delay).await;
                    continue;
                }
                _ => {}
            }

            match self.client.delete_worker_queue(&queue_id).await {
                Ok(()) => {
                    component_info!(ComponentId::current(), "deleted ephemeral queue {queue_id}");
                    return;
                }
                Err(e) => {
                    component_warn!(
                        ComponentId::current(),
                        "failed to delete queue {queue_id} (attempt {attempt}/{}): {e}",
                        self.config.release_attempts
                    );
                    tokio::time::sleep(self.config.release_retry_delay).await;
                }
            }
        }

        component_warn!(
            ComponentId::current(),
            "queue cleanup attempts exhausted, server-side TTL will reclaim {queue_id}"
        );
    }
}
