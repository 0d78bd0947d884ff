//! Shared identity and logging utilities for the agentctl workspace
//!
//! Contains only the pieces every crate needs: the component identity used
//! to tag log lines, and the tracing subscriber setup.

pub mod logging;
pub mod types;

pub use types::ComponentId;
