//! Local worker runner
//!
//! Binds the process supervisor to the orchestrator: prepares the per-queue
//! worker directory, wires the rotating log, persists the PID file, and
//! runs supervision until the worker finishes or the run is cancelled.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::CliResult;
use crate::services::daemon::{self, DaemonInfo, LOG_FILE_NAME, PID_FILE_NAME};
use crate::services::log_writer::{RotatingLogWriter, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_LOG_SIZE};
use crate::services::supervisor::{ProcessSupervisor, SupervisorConfig, WorkerLaunchSpec};
use crate::traits::{ControlPlaneApi, WorkerRunner};

/// Settings shared by every worker this runner launches
#[derive(Debug, Clone)]
pub struct WorkerRunnerSettings {
    /// Worker runtime executable
    pub program: PathBuf,
    /// Extra arguments placed before the standard ones
    pub args: Vec<String>,
    pub api_key: String,
    pub control_plane_url: String,
    /// Root directory holding one subdirectory per queue
    pub worker_root: PathBuf,
    pub max_log_size: u64,
    pub max_backups: usize,
    pub supervisor: SupervisorConfig,
}

impl WorkerRunnerSettings {
    pub fn new(
        program: impl Into<PathBuf>,
        api_key: impl Into<String>,
        control_plane_url: impl Into<String>,
        worker_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            api_key: api_key.into(),
            control_plane_url: control_plane_url.into(),
            worker_root: worker_root.into(),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            max_backups: DEFAULT_MAX_BACKUPS,
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// Production [`WorkerRunner`] supervising a worker runtime process
pub struct LocalWorkerRunner<C: ControlPlaneApi + 'static> {
    client: Arc<C>,
    settings: WorkerRunnerSettings,
}

impl<C: ControlPlaneApi + 'static> LocalWorkerRunner<C> {
    pub fn new(client: Arc<C>, settings: WorkerRunnerSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl<C: ControlPlaneApi + 'static> WorkerRunner for LocalWorkerRunner<C> {
    async fn run(&self, queue_id: &str, cancel: CancellationToken) -> CliResult<()> {
        let worker_dir = self.settings.worker_root.join(queue_id);
        std::fs::create_dir_all(&worker_dir)?;

        let log_file = worker_dir.join(LOG_FILE_NAME);
        let log_writer = Arc::new(RotatingLogWriter::new(
            &log_file,
            self.settings.max_log_size,
            self.settings.max_backups,
        )?);

        let launch = WorkerLaunchSpec {
            program: self.settings.program.clone(),
            args: self.settings.args.clone(),
            queue_id: queue_id.to_string(),
            api_key: self.settings.api_key.clone(),
            control_plane_url: self.settings.control_plane_url.clone(),
        };

        let supervisor = Arc::new(ProcessSupervisor::new(
            launch,
            worker_dir.clone(),
            log_writer,
            self.settings.supervisor.clone(),
            Some(self.client.clone()),
        ));

        let pid_file = worker_dir.join(PID_FILE_NAME);
        let info = DaemonInfo {
            pid: std::process::id(),
            queue_id: queue_id.to_string(),
            worker_dir: worker_dir.clone(),
            log_file,
            pid_file: pid_file.clone(),
            started_at: Utc::now(),
            deployment_type: "local".to_string(),
        };
        daemon::write_pid_file(&info)?;

        let stopper = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                supervisor.stop().await;
            })
        };

        let result = supervisor.supervise().await;

        stopper.abort();
        daemon::remove_pid_file(&pid_file);
        result
    }
}
