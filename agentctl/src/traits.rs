//! Trait definitions with mockall annotations for testing
//!
//! These traits are the seams between the orchestrator and its
//! collaborators. They are used for dependency injection and enable testing
//! the execution pipeline without a control plane or a worker runtime.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use controlplane::entities::{
    AgentExecution, ExecuteAgentRequest, ExecuteTeamRequest, Worker, WorkerQueue,
    WorkerQueueConfig, WorkerQueueCreateRequest,
};
use controlplane::{ControlPlaneResult, StreamEvent};

use crate::error::CliResult;

/// Remote control plane operations consumed by the execution pipeline
///
/// The production implementation delegates to `controlplane::Client`; tests
/// substitute the generated mock.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Create a worker queue in an environment
    async fn create_worker_queue(
        &self,
        environment_id: &str,
        req: WorkerQueueCreateRequest,
    ) -> ControlPlaneResult<WorkerQueue>;

    /// Retrieve a worker queue by ID
    async fn get_worker_queue(&self, id: &str) -> ControlPlaneResult<WorkerQueue>;

    /// List all worker queues visible to the caller
    async fn list_worker_queues(&self) -> ControlPlaneResult<Vec<WorkerQueue>>;

    /// Delete a worker queue
    async fn delete_worker_queue(&self, id: &str) -> ControlPlaneResult<()>;

    /// List workers currently registered against a queue
    async fn list_queue_workers(&self, queue_id: &str) -> ControlPlaneResult<Vec<Worker>>;

    /// Fetch the queue configuration, including server-managed settings
    async fn get_worker_queue_config(&self, queue_id: &str)
        -> ControlPlaneResult<WorkerQueueConfig>;

    /// Submit an agent execution
    async fn execute_agent(
        &self,
        agent_id: &str,
        req: ExecuteAgentRequest,
    ) -> ControlPlaneResult<AgentExecution>;

    /// Submit a team execution
    async fn execute_team(
        &self,
        team_id: &str,
        req: ExecuteTeamRequest,
    ) -> ControlPlaneResult<AgentExecution>;

    /// Fetch the final execution record by ID
    async fn get_execution(&self, id: &str) -> ControlPlaneResult<AgentExecution>;

    /// Open the output stream for an execution
    async fn stream_execution_output(
        &self,
        execution_id: &str,
    ) -> ControlPlaneResult<mpsc::Receiver<ControlPlaneResult<StreamEvent>>>;
}

/// Runs a local worker for a queue until it finishes or is cancelled
///
/// The production implementation supervises a worker runtime process;
/// cancelling the token is the only way to stop a running worker.
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkerRunner: Send + Sync {
    async fn run(&self, queue_id: &str, cancel: CancellationToken) -> CliResult<()>;
}

/// Opaque sink for execution output
///
/// Rendering is out of scope for the orchestrator; it only pushes text
/// chunks and structured status transitions here.
#[mockall::automock]
pub trait OutputSink: Send + Sync {
    /// Incremental response text
    fn chunk(&self, text: &str);

    /// A state transition reported by the stream
    fn status(&self, status: &str);

    /// Progress messages from the orchestrator itself
    fn notice(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that mock traits can be instantiated
    #[tokio::test]
    async fn test_mock_trait_instantiation() {
        let _mock_control_plane = MockControlPlaneApi::new();
        let _mock_worker_runner = MockWorkerRunner::new();
        let _mock_output_sink = MockOutputSink::new();
    }
}
