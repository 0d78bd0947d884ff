//! CLI configuration resolution
//!
//! Flags win over environment variables, which win over built-in defaults.

use std::path::PathBuf;

use crate::services::log_writer::DEFAULT_MAX_LOG_SIZE;

pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://control-plane.agentctl.dev";

pub const API_KEY_ENV: &str = "AGENTCTL_API_KEY";
pub const DAEMON_CHILD_ENV: &str = "AGENTCTL_DAEMON_CHILD";

const BASE_URL_ENV: &str = "AGENTCTL_CONTROL_PLANE_BASE_URL";
const GATEWAY_URL_ENV: &str = "CONTROL_PLANE_GATEWAY_URL";
const PLAIN_URL_ENV: &str = "CONTROL_PLANE_URL";
const MAX_LOG_SIZE_ENV: &str = "AGENTCTL_MAX_LOG_SIZE";
const HOME_DIR_ENV: &str = "AGENTCTL_HOME";

/// Resolve the control plane URL
///
/// Precedence: explicit flag, then `AGENTCTL_CONTROL_PLANE_BASE_URL`,
/// `CONTROL_PLANE_GATEWAY_URL`, `CONTROL_PLANE_URL`, then the default.
pub fn resolve_control_plane_url(explicit: Option<&str>) -> String {
    if let Some(url) = explicit {
        if !url.is_empty() {
            return url.to_string();
        }
    }
    for var in [BASE_URL_ENV, GATEWAY_URL_ENV, PLAIN_URL_ENV] {
        if let Ok(url) = std::env::var(var) {
            if !url.is_empty() {
                return url;
            }
        }
    }
    DEFAULT_CONTROL_PLANE_URL.to_string()
}

/// Resolve the API key from flag or environment
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()))
}

/// Root directory for per-queue worker state
pub fn worker_root() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_DIR_ENV) {
        return PathBuf::from(dir).join("workers");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".agentctl").join("workers")
}

/// Configured maximum log size, falling back to the default
pub fn max_log_size() -> u64 {
    std::env::var(MAX_LOG_SIZE_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_MAX_LOG_SIZE)
}

/// True when this process is the daemonized worker child
pub fn is_daemon_child() -> bool {
    std::env::var(DAEMON_CHILD_ENV)
        .map(|value| value == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_url_wins() {
        assert_eq!(
            resolve_control_plane_url(Some("https://explicit.example.com")),
            "https://explicit.example.com"
        );
    }

    #[test]
    fn test_url_env_chain_and_default() {
        // Env manipulation is process-global, so the whole chain lives in
        // one test.
        std::env::remove_var(BASE_URL_ENV);
        std::env::remove_var(GATEWAY_URL_ENV);
        std::env::remove_var(PLAIN_URL_ENV);
        assert_eq!(resolve_control_plane_url(None), DEFAULT_CONTROL_PLANE_URL);

        std::env::set_var(PLAIN_URL_ENV, "https://plain.example.com");
        assert_eq!(resolve_control_plane_url(None), "https://plain.example.com");

        std::env::set_var(GATEWAY_URL_ENV, "https://gateway.example.com");
        assert_eq!(
            resolve_control_plane_url(None),
            "https://gateway.example.com"
        );

        std::env::set_var(BASE_URL_ENV, "https://base.example.com");
        assert_eq!(resolve_control_plane_url(None), "https://base.example.com");

        // Explicit still beats the whole chain
        assert_eq!(
            resolve_control_plane_url(Some("https://flag.example.com")),
            "https://flag.example.com"
        );

        std::env::remove_var(BASE_URL_ENV);
        std::env::remove_var(GATEWAY_URL_ENV);
        std::env::remove_var(PLAIN_URL_ENV);
    }

    #[test]
    fn test_api_key_prefers_explicit_value() {
        assert_eq!(resolve_api_key(Some("flag-key")).as_deref(), Some("flag-key"));
        assert_eq!(resolve_api_key(Some("")), resolve_api_key(None));
    }
}
