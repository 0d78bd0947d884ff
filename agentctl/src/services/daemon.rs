//! PID-file persistence and daemon signaling
//!
//! The supervisor writes a JSON PID file so a later CLI invocation can
//! discover, inspect, or stop a running worker.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

pub const PID_FILE_NAME: &str = "worker.pid";
pub const LOG_FILE_NAME: &str = "worker.log";

/// Information about a running daemonized worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub pid: u32,
    pub queue_id: String,
    pub worker_dir: PathBuf,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub deployment_type: String,
}

/// Persist daemon info to its PID file
pub fn write_pid_file(info: &DaemonInfo) -> CliResult<()> {
    let data = serde_json::to_vec_pretty(info)?;
    fs::write(&info.pid_file, data)?;
    Ok(())
}

/// Read daemon info back from a PID file
pub fn read_daemon_info(pid_file: &Path) -> CliResult<DaemonInfo> {
    let data = fs::read(pid_file)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Remove a PID file; missing files are fine
pub fn remove_pid_file(pid_file: &Path) {
    let _ = fs::remove_file(pid_file);
}

/// Check whether a process with the given PID exists (signal 0)
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    false
}

/// Stop a daemonized worker: SIGTERM, poll for exit, escalate to SIGKILL
///
/// Removes the PID file once the process is gone. Returns the daemon info
/// of the stopped worker.
#[cfg(unix)]
pub async fn stop_daemon(pid_file: &Path, wait: Duration) -> CliResult<DaemonInfo> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let info = read_daemon_info(pid_file)?;
    if !is_process_running(info.pid) {
        remove_pid_file(pid_file);
        return Err(CliError::WorkerNotRunning { pid: info.pid });
    }

    let pid = Pid::from_raw(info.pid as i32);
    signal::kill(pid, Signal::SIGTERM).map_err(|e| CliError::SignalFailed {
        message: format!("SIGTERM to PID {}: {e}", info.pid),
    })?;

    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if !is_process_running(info.pid) {
            remove_pid_file(pid_file);
            return Ok(info);
        }
    }

    let _ = signal::kill(pid, Signal::SIGKILL);
    Err(CliError::WorkerStopForced { pid: info.pid })
}

#[cfg(not(unix))]
pub async fn stop_daemon(pid_file: &Path, _wait: Duration) -> CliResult<DaemonInfo> {
    let _ = read_daemon_info(pid_file)?;
    Err(CliError::SignalFailed {
        message: "daemon control is only supported on unix".to_string(),
    })
}
