//! agentctl library
//!
//! Local worker supervision and execution orchestration for the control
//! plane CLI: a crash-recovering process supervisor feeding a rotating log,
//! a one-shot readiness handshake, ephemeral queue lifecycle management,
//! and the orchestrator tying them to remote submissions.

pub mod config;
pub mod error;
pub mod execenv;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use error::{CliError, CliResult};
pub use orchestrator::{
    ExecutionOrchestrator, ExecutionRequest, ExecutionTarget, MultiQueueSummary,
    OrchestratorConfig, QueueExecutionResult, QueueSelector,
};
pub use traits::{ControlPlaneApi, OutputSink, WorkerRunner};
