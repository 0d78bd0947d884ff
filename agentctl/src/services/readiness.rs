//! One-shot parent/child readiness handshake
//!
//! The parent binds a loopback rendezvous socket and hands its address to
//! the child through the environment. The child connects once, pushes a
//! small JSON payload describing itself, and closes. Every deadline is
//! bounded and the listener is torn down on every exit path.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Instant};

use crate::error::{CliError, CliResult};

/// How long the parent waits for the child to report readiness
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline applied to each individual handshake I/O step
const HANDSHAKE_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable carrying the parent's rendezvous address
pub const READY_ADDR_ENV: &str = "AGENTCTL_READY_ADDR";

/// Payload the child sends once it has finished initializing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessInfo {
    pub pid: u32,
    pub queue_id: String,
    pub control_plane_url: String,
    pub worker_dir: PathBuf,
    pub start_time: DateTime<Utc>,
}

/// Parent side: accepts exactly one readiness report
pub struct ReadinessListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ReadinessListener {
    /// Bind a fresh rendezvous endpoint on the loopback interface
    pub async fn bind() -> CliResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            CliError::ReadinessConnectionFailed {
                message: format!("failed to bind rendezvous socket: {e}"),
            }
        })?;
        let addr = listener
            .local_addr()
            .map_err(|e| CliError::ReadinessConnectionFailed {
                message: format!("failed to resolve rendezvous address: {e}"),
            })?;
        Ok(Self { listener, addr })
    }

    /// Address the child must connect back to
    pub fn rendezvous_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the child's payload
    ///
    /// Consumes the listener, so the rendezvous endpoint is released on
    /// every exit path. Returns exactly one of the payload or a typed
    /// connection/decode/timeout failure.
    pub async fn wait_for_ready(self, wait: Duration) -> CliResult<ReadinessInfo> {
        let start = Instant::now();

        let (mut stream, _) = match timeout(wait, self.listener.accept()).await {
            Err(_) => {
                return Err(CliError::ReadinessTimeout {
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(e)) => {
                return Err(CliError::ReadinessConnectionFailed {
                    message: format!("accept failed: {e}"),
                })
            }
            Ok(Ok(conn)) => conn,
        };

        let mut payload = Vec::new();
        match timeout(HANDSHAKE_IO_TIMEOUT, stream.read_to_end(&mut payload)).await {
            Err(_) => {
                return Err(CliError::ReadinessTimeout {
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(e)) => {
                return Err(CliError::ReadinessConnectionFailed {
                    message: format!("read failed: {e}"),
                })
            }
            Ok(Ok(_)) => {}
        }

        serde_json::from_slice(&payload).map_err(|e| CliError::ReadinessDecodeFailed {
            message: e.to_string(),
        })
    }
}

/// Child side: reports readiness back to the waiting parent
pub struct ReadinessSignaler {
    rendezvous: Option<SocketAddr>,
}

impl ReadinessSignaler {
    pub fn new(rendezvous: Option<SocketAddr>) -> Self {
        Self { rendezvous }
    }

    /// Pick up the rendezvous address the parent put in the environment
    pub fn from_env() -> Self {
        let rendezvous = std::env::var(READY_ADDR_ENV)
            .ok()
            .and_then(|addr| addr.parse().ok());
        Self { rendezvous }
    }

    /// Send the readiness payload to the parent
    ///
    /// A no-op success when no rendezvous address was configured: the
    /// process was not launched in handshake mode.
    pub async fn signal_ready(&self, info: &ReadinessInfo) -> CliResult<()> {
        let Some(addr) = self.rendezvous else {
            return Ok(());
        };

        let mut stream = match timeout(HANDSHAKE_IO_TIMEOUT, TcpStream::connect(addr)).await {
            Err(_) => {
                return Err(CliError::ReadinessTimeout {
                    elapsed: HANDSHAKE_IO_TIMEOUT,
                })
            }
            Ok(Err(e)) => {
                return Err(CliError::ReadinessConnectionFailed {
                    message: format!("failed to connect to parent at {addr}: {e}"),
                })
            }
            Ok(Ok(stream)) => stream,
        };

        let payload = serde_json::to_vec(info)?;
        let send = async {
            stream.write_all(&payload).await?;
            stream.shutdown().await
        };
        match timeout(HANDSHAKE_IO_TIMEOUT, send).await {
            Err(_) => Err(CliError::ReadinessTimeout {
                elapsed: HANDSHAKE_IO_TIMEOUT,
            }),
            Ok(Err(e)) => Err(CliError::ReadinessConnectionFailed {
                message: format!("failed to send readiness payload: {e}"),
            }),
            Ok(Ok(())) => Ok(()),
        }
    }
}
