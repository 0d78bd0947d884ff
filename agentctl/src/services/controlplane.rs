//! Control plane API adapter
//!
//! Thin delegation from the [`ControlPlaneApi`] seam onto the HTTP client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use controlplane::entities::{
    AgentExecution, ExecuteAgentRequest, ExecuteTeamRequest, Worker, WorkerQueue,
    WorkerQueueConfig, WorkerQueueCreateRequest,
};
use controlplane::{Client, ControlPlaneResult, StreamEvent};

use crate::traits::ControlPlaneApi;

/// Production [`ControlPlaneApi`] backed by the HTTP client
pub struct RealControlPlane {
    inner: Client,
}

impl RealControlPlane {
    pub fn new(inner: Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ControlPlaneApi for RealControlPlane {
    async fn create_worker_queue(
        &self,
        environment_id: &str,
        req: WorkerQueueCreateRequest,
    ) -> ControlPlaneResult<WorkerQueue> {
        self.inner.create_worker_queue(environment_id, &req).await
    }

    async fn get_worker_queue(&self, id: &str) -> ControlPlaneResult<WorkerQueue> {
        self.inner.get_worker_queue(id).await
    }

    async fn list_worker_queues(&self) -> ControlPlaneResult<Vec<WorkerQueue>> {
        self.inner.list_worker_queues().await
    }

    async fn delete_worker_queue(&self, id: &str) -> ControlPlaneResult<()> {
        self.inner.delete_worker_queue(id).await
    }

    async fn list_queue_workers(&self, queue_id: &str) -> ControlPlaneResult<Vec<Worker>> {
        self.inner.list_queue_workers(queue_id).await
    }

    async fn get_worker_queue_config(
        &self,
        queue_id: &str,
    ) -> ControlPlaneResult<WorkerQueueConfig> {
        self.inner.get_worker_queue_config(queue_id).await
    }

    async fn execute_agent(
        &self,
        agent_id: &str,
        req: ExecuteAgentRequest,
    ) -> ControlPlaneResult<AgentExecution> {
        self.inner.execute_agent(agent_id, &req).await
    }

    async fn execute_team(
        &self,
        team_id: &str,
        req: ExecuteTeamRequest,
    ) -> ControlPlaneResult<AgentExecution> {
        self.inner.execute_team(team_id, &req).await
    }

    async fn get_execution(&self, id: &str) -> ControlPlaneResult<AgentExecution> {
        self.inner.get_execution(id).await
    }

    async fn stream_execution_output(
        &self,
        execution_id: &str,
    ) -> ControlPlaneResult<mpsc::Receiver<ControlPlaneResult<StreamEvent>>> {
        self.inner.stream_execution_output(execution_id).await
    }
}
