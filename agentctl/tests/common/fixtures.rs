//! Test fixtures and data for orchestrator tests

use chrono::Utc;
use controlplane::entities::{AgentExecution, ExecutionStatus, Worker, WorkerQueue};
use controlplane::StreamEvent;

use agentctl::orchestrator::{ExecutionRequest, ExecutionTarget};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const ENVIRONMENT: &'static str = "env-test";
    pub const AGENT: &'static str = "agent-1";

    pub fn queue(id: &str, name: &str) -> WorkerQueue {
        WorkerQueue {
            id: id.to_string(),
            name: name.to_string(),
            environment_id: Some(Self::ENVIRONMENT.to_string()),
            ephemeral: Some(true),
            single_execution_mode: Some(true),
            auto_cleanup_after_seconds: Some(300),
        }
    }

    pub fn worker(id: &str) -> Worker {
        Worker {
            id: id.to_string(),
            status: Some("ready".to_string()),
            last_heartbeat: Some(Utc::now()),
        }
    }

    pub fn execution(id: &str) -> AgentExecution {
        AgentExecution {
            id: Some(id.to_string()),
            execution_id: None,
            status: ExecutionStatus::Running,
            response: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn agent_request(prompt: &str) -> ExecutionRequest {
        ExecutionRequest {
            target: ExecutionTarget::Agent(Self::AGENT.to_string()),
            prompt: prompt.to_string(),
            parent_execution_id: None,
            environment: None,
        }
    }

    /// A short stream: one chunk, then completion
    pub fn one_chunk_stream(content: &str) -> Vec<StreamEvent> {
        vec![StreamEvent::chunk(content), StreamEvent::complete()]
    }
}
