//! Service implementations
//!
//! The local supervision building blocks plus the production
//! implementations of the orchestrator's service traits.

pub mod controlplane;
pub mod daemon;
pub mod log_writer;
pub mod proxy;
pub mod queue_manager;
pub mod readiness;
pub mod sink;
pub mod supervisor;
pub mod worker_runner;

// Re-export the commonly used service types
pub use controlplane::RealControlPlane;
pub use log_writer::RotatingLogWriter;
pub use queue_manager::{EphemeralQueueManager, QueueManagerConfig};
pub use readiness::{ReadinessInfo, ReadinessListener, ReadinessSignaler};
pub use sink::ConsoleSink;
pub use supervisor::{ProcessSupervisor, SupervisorConfig, WorkerLaunchSpec};
pub use worker_runner::{LocalWorkerRunner, WorkerRunnerSettings};
