//! Control plane HTTP client

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::entities::{
    AgentExecution, ExecuteAgentRequest, ExecuteTeamRequest, Worker, WorkerQueue,
    WorkerQueueConfig, WorkerQueueCreateRequest,
};
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::stream::{spawn_event_reader, StreamEvent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client for the control plane REST API
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl Client {
    /// Create a client against `base_url`, authenticating with `api_key`
    pub fn new(base_url: &str, api_key: impl Into<String>) -> ControlPlaneResult<Self> {
        let base_url = Url::parse(base_url).map_err(|_| ControlPlaneError::InvalidBaseUrl {
            url: base_url.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> ControlPlaneResult<Url> {
        self.base_url
            .join(path)
            .map_err(|_| ControlPlaneError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
            })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ControlPlaneResult<T> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ControlPlaneResult<T> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, path: &str) -> ControlPlaneResult<()> {
        let url = self.endpoint(path)?;
        debug!("DELETE {url}");
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> ControlPlaneResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ControlPlaneError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ControlPlaneResult<T> {
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ControlPlaneError::Decode {
            message: e.to_string(),
        })
    }

    /// Create a new worker queue in an environment
    pub async fn create_worker_queue(
        &self,
        environment_id: &str,
        req: &WorkerQueueCreateRequest,
    ) -> ControlPlaneResult<WorkerQueue> {
        self.post(
            &format!("api/v1/environments/{environment_id}/worker-queues"),
            req,
        )
        .await
    }

    /// Retrieve a worker queue by ID
    pub async fn get_worker_queue(&self, id: &str) -> ControlPlaneResult<WorkerQueue> {
        self.get(&format!("api/v1/worker-queues/{id}")).await
    }

    /// List all worker queues visible to the caller
    pub async fn list_worker_queues(&self) -> ControlPlaneResult<Vec<WorkerQueue>> {
        self.get("api/v1/worker-queues").await
    }

    /// Delete a worker queue
    pub async fn delete_worker_queue(&self, id: &str) -> ControlPlaneResult<()> {
        self.delete(&format!("api/v1/worker-queues/{id}")).await
    }

    /// List workers registered against a queue
    pub async fn list_queue_workers(&self, queue_id: &str) -> ControlPlaneResult<Vec<Worker>> {
        self.get(&format!("api/v1/worker-queues/{queue_id}/workers"))
            .await
    }

    /// Fetch the queue configuration, including server-managed settings
    pub async fn get_worker_queue_config(
        &self,
        queue_id: &str,
    ) -> ControlPlaneResult<WorkerQueueConfig> {
        self.get(&format!("api/v1/worker-queues/{queue_id}/config"))
            .await
    }

    /// Submit an agent execution
    pub async fn execute_agent(
        &self,
        agent_id: &str,
        req: &ExecuteAgentRequest,
    ) -> ControlPlaneResult<AgentExecution> {
        self.post(&format!("api/v1/agents/{agent_id}/execute"), req)
            .await
    }

    /// Submit a team execution
    pub async fn execute_team(
        &self,
        team_id: &str,
        req: &ExecuteTeamRequest,
    ) -> ControlPlaneResult<AgentExecution> {
        self.post(&format!("api/v1/teams/{team_id}/execute"), req)
            .await
    }

    /// Fetch the final execution record by ID
    pub async fn get_execution(&self, id: &str) -> ControlPlaneResult<AgentExecution> {
        self.get(&format!("api/v1/executions/{id}")).await
    }

    /// Open the output stream for an execution
    ///
    /// Events arrive on the returned channel; the channel closes when the
    /// stream ends or a terminal event was delivered.
    pub async fn stream_execution_output(
        &self,
        execution_id: &str,
    ) -> ControlPlaneResult<mpsc::Receiver<ControlPlaneResult<StreamEvent>>> {
        let url = self.endpoint(&format!("api/v1/executions/{execution_id}/stream"))?;
        debug!("GET {url} (stream)");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            // The stream outlives the ordinary request budget
            .timeout(Duration::from_secs(24 * 60 * 60))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(spawn_event_reader(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = Client::new("not a url", "key");
        assert!(matches!(
            result,
            Err(ControlPlaneError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = Client::new("https://cp.example.com/", "key").unwrap();
        let url = client.endpoint("api/v1/worker-queues/q1").unwrap();
        assert_eq!(url.as_str(), "https://cp.example.com/api/v1/worker-queues/q1");
    }
}
