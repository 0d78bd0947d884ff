//! Shared logging utilities for consistent tracing across all components

use crate::types::ComponentId;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Initialize the tracing subscriber with component-specific filtering
///
/// The filter keeps our own crates at the requested level while quieting the
/// HTTP stack underneath. `log_level` falls back to `info` when absent.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let filter = filter_for(ComponentId::current(), base_level);

    fmt()
        .with_env_filter(EnvFilter::new(&filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn filter_for(component: ComponentId, base_level: &str) -> String {
    match component {
        ComponentId::Cli => {
            format!("agentctl={base_level},controlplane={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
        ComponentId::Worker => {
            format!("agentctl={base_level},controlplane={base_level},shared={base_level},reqwest=warn")
        }
        ComponentId::Proxy => format!("agentctl={base_level},shared={base_level}"),
    }
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for component-aware info logging
#[macro_export]
macro_rules! component_info {
    ($component_id:expr, $($arg:tt)*) => {
        tracing::info!(
            component = %$component_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware warning logging
#[macro_export]
macro_rules! component_warn {
    ($component_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            component = %$component_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware error logging
#[macro_export]
macro_rules! component_error {
    ($component_id:expr, $($arg:tt)*) => {
        tracing::error!(
            component = %$component_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware debug logging
#[macro_export]
macro_rules! component_debug {
    ($component_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            component = %$component_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(component_id: &ComponentId, details: &str) {
    info!(
        component = %component_id,
        timestamp = format_timestamp(),
        "Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component_id: &ComponentId, reason: &str) {
    info!(
        component = %component_id,
        timestamp = format_timestamp(),
        "Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component_id: &ComponentId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = %component_id,
        timestamp = format_timestamp(),
        error = %error,
        "{} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component_id: &ComponentId, message: &str) {
    info!(
        component = %component_id,
        timestamp = format_timestamp(),
        "{}",
        message
    );
}
