//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static CURRENT_COMPONENT: OnceLock<ComponentId> = OnceLock::new();

/// Identity of the running component, used to tag log output
///
/// The CLI process sets this once at startup; spawned helper roles (the
/// daemonized worker supervisor, the local proxy) set their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    Cli,
    Worker,
    Proxy,
}

impl ComponentId {
    /// Initialize the process-wide component identity for the CLI
    pub fn init_cli() {
        let _ = CURRENT_COMPONENT.set(ComponentId::Cli);
    }

    /// Initialize the process-wide component identity for the worker supervisor
    pub fn init_worker() {
        let _ = CURRENT_COMPONENT.set(ComponentId::Worker);
    }

    /// Initialize the process-wide component identity for the proxy helper
    pub fn init_proxy() {
        let _ = CURRENT_COMPONENT.set(ComponentId::Proxy);
    }

    /// Current component identity; defaults to the CLI when never initialized
    pub fn current() -> ComponentId {
        *CURRENT_COMPONENT.get().unwrap_or(&ComponentId::Cli)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Cli => write!(f, "cli"),
            ComponentId::Worker => write!(f, "worker"),
            ComponentId::Proxy => write!(f, "proxy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_display() {
        assert_eq!(ComponentId::Cli.to_string(), "cli");
        assert_eq!(ComponentId::Worker.to_string(), "worker");
        assert_eq!(ComponentId::Proxy.to_string(), "proxy");
    }

    #[test]
    fn test_current_defaults_to_cli() {
        // No init in this test binary, so the fallback applies
        assert_eq!(ComponentId::current(), ComponentId::Cli);
    }
}
