//! Request and response entities for the control plane API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A worker queue as returned by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueue {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub ephemeral: Option<bool>,
    #[serde(default)]
    pub single_execution_mode: Option<bool>,
    #[serde(default)]
    pub auto_cleanup_after_seconds: Option<u64>,
}

/// Payload for creating a worker queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueCreateRequest {
    pub name: String,
    pub environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_execution_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cleanup_after_seconds: Option<u64>,
}

/// Queue configuration, including free-form settings controlled server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A worker registered against a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Execution status reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

/// An agent or team execution record
///
/// Older API versions report `execution_id` instead of `id`; `id()` papers
/// over the difference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AgentExecution {
    pub fn id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.execution_id.as_deref())
            .unwrap_or_default()
    }
}

/// Execution environment overrides for a submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionEnvironmentOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionEnvironmentOverride {
    pub fn is_empty(&self) -> bool {
        self.env_vars.is_none()
            && self.working_dir.is_none()
            && self.secrets.is_none()
            && self.timeout_seconds.is_none()
    }
}

/// Payload for submitting an agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteAgentRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_queue_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_environment: Option<ExecutionEnvironmentOverride>,
}

/// Payload for submitting a team execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteTeamRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_queue_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_environment: Option<ExecutionEnvironmentOverride>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_id_fallback() {
        let exec = AgentExecution {
            id: None,
            execution_id: Some("exec-123".to_string()),
            status: ExecutionStatus::Running,
            response: None,
            created_at: None,
        };
        assert_eq!(exec.id(), "exec-123");

        let exec = AgentExecution {
            id: Some("exec-456".to_string()),
            execution_id: Some("exec-123".to_string()),
            status: ExecutionStatus::Running,
            response: None,
            created_at: None,
        };
        assert_eq!(exec.id(), "exec-456");
    }

    #[test]
    fn test_create_request_omits_unset_flags() {
        let req = WorkerQueueCreateRequest {
            name: "q".to_string(),
            environment_id: "env".to_string(),
            ephemeral: None,
            single_execution_mode: None,
            auto_cleanup_after_seconds: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("ephemeral"));
        assert!(!json.contains("auto_cleanup_after_seconds"));
    }

    #[test]
    fn test_execution_status_decodes_lowercase() {
        let status: ExecutionStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(status, ExecutionStatus::Running);
    }
}
