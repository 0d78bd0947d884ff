//! Best-effort colocated LLM proxy
//!
//! Some queues route worker LLM traffic through a proxy running next to the
//! worker. The supervisor provisions it when the queue configuration asks
//! for one; every failure here is demoted to a warning upstream.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::error::{CliError, CliResult};

/// Queue-level settings block controlling the colocated proxy
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub command: Vec<String>,
    pub port: u16,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: u64,
}

fn default_startup_timeout() -> u64 {
    30
}

impl ProxySettings {
    /// Extract proxy settings from the queue's settings document
    ///
    /// Returns None when the block is absent, disabled, or unusable.
    pub fn from_queue_settings(settings: &serde_json::Value) -> Option<ProxySettings> {
        let block = settings.get("local_proxy")?;
        let parsed: ProxySettings = serde_json::from_value(block.clone()).ok()?;
        if parsed.enabled && !parsed.command.is_empty() {
            Some(parsed)
        } else {
            None
        }
    }
}

/// Handle to a running local proxy process
pub struct LlmProxy {
    child: Child,
    base_url: String,
    api_key: Option<String>,
    pid: u32,
}

impl LlmProxy {
    /// Spawn the proxy command and wait until its port accepts connections
    pub async fn start(settings: &ProxySettings, worker_dir: &Path) -> CliResult<LlmProxy> {
        let mut cmd = Command::new(&settings.command[0]);
        cmd.args(&settings.command[1..])
            .current_dir(worker_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| CliError::ProxyFailed {
            message: format!("failed to spawn {}: {e}", settings.command[0]),
        })?;
        let pid = child.id().unwrap_or(0);

        let wait = Duration::from_secs(settings.startup_timeout_seconds);
        if let Err(e) = wait_port_ready(settings.port, wait).await {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }

        Ok(LlmProxy {
            child,
            base_url: format!("http://127.0.0.1:{}", settings.port),
            api_key: settings.api_key.clone(),
            pid,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kill the proxy process and reap it
    pub async fn stop(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

async fn wait_port_ready(port: u16, wait: Duration) -> CliResult<()> {
    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err(CliError::ProxyFailed {
        message: format!(
            "proxy did not accept connections on port {port} within {}s",
            wait.as_secs()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_parse_when_enabled() {
        let settings = json!({
            "local_proxy": {
                "enabled": true,
                "command": ["llm-proxy", "--port", "4000"],
                "port": 4000,
                "api_key": "proxy-key"
            }
        });
        let parsed = ProxySettings::from_queue_settings(&settings).unwrap();
        assert_eq!(parsed.port, 4000);
        assert_eq!(parsed.command.len(), 3);
        assert_eq!(parsed.api_key.as_deref(), Some("proxy-key"));
        assert_eq!(parsed.startup_timeout_seconds, 30);
    }

    #[test]
    fn test_disabled_or_absent_settings_yield_none() {
        let disabled = json!({
            "local_proxy": {"enabled": false, "command": ["llm-proxy"], "port": 4000}
        });
        assert!(ProxySettings::from_queue_settings(&disabled).is_none());

        let absent = json!({"other": true});
        assert!(ProxySettings::from_queue_settings(&absent).is_none());

        let no_command = json!({"local_proxy": {"enabled": true, "command": [], "port": 4000}});
        assert!(ProxySettings::from_queue_settings(&no_command).is_none());
    }
}
