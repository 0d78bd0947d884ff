//! Error types for the execution pipeline

use controlplane::ControlPlaneError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to create ephemeral queue: {message}")]
    QueueCreateFailed { message: String },

    #[error("invalid queue {id}: {message}")]
    InvalidQueue { id: String, message: String },

    #[error("queue not found: {name}")]
    QueueNotFound { name: String },

    #[error("timed out waiting for a worker to register after {}s (first runs install worker dependencies; retry once they are cached)", .elapsed.as_secs())]
    WorkerAttachTimeout { elapsed: Duration },

    #[error("readiness timeout exceeded after {}ms", .elapsed.as_millis())]
    ReadinessTimeout { elapsed: Duration },

    #[error("readiness connection failed: {message}")]
    ReadinessConnectionFailed { message: String },

    #[error("readiness decode failed: {message}")]
    ReadinessDecodeFailed { message: String },

    #[error("failed to start worker process: {message}")]
    WorkerSpawnFailed { message: String },

    #[error("worker crashed {attempts} times within the cooldown window, giving up")]
    SupervisorExhausted { attempts: u32 },

    #[error("local proxy unavailable: {message}")]
    ProxyFailed { message: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("streaming error: {message}")]
    StreamingFailed { message: String },

    #[error("{failed} executions failed")]
    MultiQueueFailed { failed: usize },

    #[error("execution force terminated by user")]
    ForceTerminated,

    #[error("interrupted by user")]
    Interrupted,

    #[error("worker process (PID {pid}) is not running")]
    WorkerNotRunning { pid: u32 },

    #[error("worker (PID {pid}) did not stop gracefully, sent SIGKILL")]
    WorkerStopForced { pid: u32 },

    #[error("failed to signal worker: {message}")]
    SignalFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
