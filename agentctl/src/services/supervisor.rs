//! Crash-recovering process supervisor
//!
//! Owns one worker runtime process: launches it, pumps its combined
//! stdout/stderr into the rotating log, waits for exit, and restarts with
//! bounded exponential backoff. The loop is an explicit phase machine so
//! the attempt ceiling and cooldown-reset rules stay visible and testable.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use shared::{component_warn, ComponentId};

use crate::error::{CliError, CliResult};
use crate::services::log_writer::RotatingLogWriter;
use crate::services::proxy::{LlmProxy, ProxySettings};
use crate::traits::ControlPlaneApi;

/// Tunables for the supervision loop
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub max_restart_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub restart_cooldown: Duration,
    pub log_level: String,
    /// Exit supervision after one clean worker run
    pub single_execution: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restart_attempts: 5,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(5 * 60),
            restart_cooldown: Duration::from_secs(10 * 60),
            log_level: "info".to_string(),
            single_execution: false,
        }
    }
}

/// Everything needed to launch one worker runtime process
#[derive(Debug, Clone)]
pub struct WorkerLaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub queue_id: String,
    pub api_key: String,
    pub control_plane_url: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct SupervisorState {
    restart_count: u32,
    last_restart: Option<Instant>,
}

/// How one supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Exited { code: Option<i32>, success: bool },
    Interrupted,
}

/// Decision taken at the restart gate before launching again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestartGate {
    Proceed,
    ResetAndProceed,
    GiveUp,
}

/// Phases of the supervision loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Backoff,
    Running,
    Stopped,
}

/// Backoff before restart attempt `restart_count + 1`: zero for the first
/// launch, then `base * 2^(k-1)` capped
pub(crate) fn backoff_for_attempt(restart_count: u32, base: Duration, cap: Duration) -> Duration {
    if restart_count == 0 {
        return Duration::ZERO;
    }
    let shift = (restart_count - 1).min(20);
    base.saturating_mul(1u32 << shift).min(cap)
}

/// Gate evaluated before each launch once the attempt ceiling is in sight
pub(crate) fn evaluate_restart_gate(
    restart_count: u32,
    max_attempts: u32,
    since_last_restart: Option<Duration>,
    cooldown: Duration,
) -> RestartGate {
    if restart_count < max_attempts {
        return RestartGate::Proceed;
    }
    match since_last_restart {
        Some(elapsed) if elapsed >= cooldown => RestartGate::ResetAndProceed,
        _ => RestartGate::GiveUp,
    }
}

/// Supervises a single worker runtime process with crash recovery
pub struct ProcessSupervisor<C: ControlPlaneApi + 'static> {
    launch: WorkerLaunchSpec,
    worker_dir: PathBuf,
    config: SupervisorConfig,
    log_writer: Arc<RotatingLogWriter>,
    state: Mutex<SupervisorState>,
    stop: CancellationToken,
    proxy: tokio::sync::Mutex<Option<LlmProxy>>,
    control_plane: Option<Arc<C>>,
}

impl<C: ControlPlaneApi + 'static> ProcessSupervisor<C> {
    pub fn new(
        launch: WorkerLaunchSpec,
        worker_dir: PathBuf,
        log_writer: Arc<RotatingLogWriter>,
        config: SupervisorConfig,
        control_plane: Option<Arc<C>>,
    ) -> Self {
        Self {
            launch,
            worker_dir,
            config,
            log_writer,
            state: Mutex::new(SupervisorState::default()),
            stop: CancellationToken::new(),
            proxy: tokio::sync::Mutex::new(None),
            control_plane,
        }
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Idempotent stop: shut the proxy down first, then end the loop
    pub async fn stop(&self) {
        self.shutdown_proxy().await;
        self.stop.cancel();
    }

    /// Drive the supervision loop until completion, stop, or exhaustion
    pub async fn supervise(&self) -> CliResult<()> {
        let mut phase = Phase::Idle;
        let mut exit: CliResult<()> = Ok(());

        while phase != Phase::Stopped {
            phase = match phase {
                Phase::Idle => {
                    if self.stop.is_cancelled() {
                        self.log("supervisor received stop signal, exiting");
                        Phase::Stopped
                    } else {
                        Phase::Backoff
                    }
                }
                Phase::Backoff => {
                    let (count, delay) = {
                        let state = self.lock_state();
                        let delay = backoff_for_attempt(
                            state.restart_count,
                            self.config.backoff_base,
                            self.config.backoff_cap,
                        );
                        (state.restart_count, delay)
                    };

                    if !delay.is_zero() {
                        self.log(&format!(
                            "waiting {:.1}s before restarting (attempt {}/{})",
                            delay.as_secs_f64(),
                            count,
                            self.config.max_restart_attempts
                        ));
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.stop.cancelled() => {}
                        }
                    }

                    if self.stop.is_cancelled() {
                        self.log("supervisor received stop signal, exiting");
                        Phase::Stopped
                    } else {
                        match self.restart_gate() {
                            RestartGate::Proceed => Phase::Running,
                            RestartGate::ResetAndProceed => {
                                self.log("cooldown elapsed, resetting restart counter");
                                self.lock_state().restart_count = 0;
                                Phase::Running
                            }
                            RestartGate::GiveUp => {
                                self.log(&format!(
                                    "max restart attempts ({}) exceeded, stopping supervisor",
                                    self.config.max_restart_attempts
                                ));
                                exit = Err(CliError::SupervisorExhausted {
                                    attempts: self.config.max_restart_attempts,
                                });
                                Phase::Stopped
                            }
                        }
                    }
                }
                Phase::Running => {
                    self.ensure_proxy().await;

                    let attempt = self.lock_state().restart_count + 1;
                    self.log(&format!("starting worker process (attempt {attempt})"));

                    let outcome = self.run_worker_once().await;
                    {
                        let mut state = self.lock_state();
                        state.restart_count += 1;
                        state.last_restart = Some(Instant::now());
                    }

                    match outcome {
                        Ok(RunOutcome::Interrupted) => {
                            self.log("worker interrupted by stop signal");
                            Phase::Stopped
                        }
                        Ok(RunOutcome::Exited { code, success }) => {
                            if success {
                                self.log("worker process exited normally");
                            } else {
                                match code {
                                    Some(code) => self
                                        .log(&format!("worker process exited with status {code}")),
                                    None => self.log("worker process terminated by signal"),
                                }
                            }
                            if success && self.config.single_execution {
                                self.log("single execution complete, supervisor exiting");
                                Phase::Stopped
                            } else {
                                Phase::Idle
                            }
                        }
                        Err(e) => {
                            self.log(&format!("failed to launch worker: {e}"));
                            Phase::Idle
                        }
                    }
                }
                Phase::Stopped => Phase::Stopped,
            };
        }

        self.shutdown_proxy().await;
        exit
    }

    fn lock_state(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn restart_gate(&self) -> RestartGate {
        let state = self.lock_state();
        let since = state.last_restart.map(|t| t.elapsed());
        evaluate_restart_gate(
            state.restart_count,
            self.config.max_restart_attempts,
            since,
            self.config.restart_cooldown,
        )
    }

    /// Provision the colocated LLM proxy once, if the queue asks for one.
    /// Best-effort: any failure logs a warning and the worker runs without.
    async fn ensure_proxy(&self) {
        let Some(client) = &self.control_plane else {
            return;
        };
        let mut slot = self.proxy.lock().await;
        if slot.is_some() {
            return;
        }

        let config = match client.get_worker_queue_config(&self.launch.queue_id).await {
            Ok(config) => config,
            Err(e) => {
                self.log(&format!("warning: could not fetch queue config: {e}"));
                return;
            }
        };
        let Some(settings) = config
            .settings
            .as_ref()
            .and_then(ProxySettings::from_queue_settings)
        else {
            return;
        };

        self.log("local LLM proxy enabled in queue config");
        match LlmProxy::start(&settings, &self.worker_dir).await {
            Ok(proxy) => {
                self.log(&format!(
                    "local LLM proxy started at {} (PID {})",
                    proxy.base_url(),
                    proxy.pid()
                ));
                *slot = Some(proxy);
            }
            Err(e) => {
                component_warn!(
                    ComponentId::current(),
                    "LLM proxy failed to start, continuing without it: {e}"
                );
                self.log(&format!(
                    "warning: LLM proxy failed to start, continuing without it: {e}"
                ));
            }
        }
    }

    async fn shutdown_proxy(&self) {
        let proxy = self.proxy.lock().await.take();
        if let Some(proxy) = proxy {
            self.log("stopping local LLM proxy");
            proxy.stop().await;
        }
    }

    async fn run_worker_once(&self) -> CliResult<RunOutcome> {
        let mut cmd = Command::new(&self.launch.program);
        cmd.args(&self.launch.args)
            .arg("--queue-id")
            .arg(&self.launch.queue_id)
            .arg("--api-key")
            .arg(&self.launch.api_key)
            .arg("--control-plane-url")
            .arg(&self.launch.control_plane_url);
        if self.config.single_execution {
            cmd.arg("--single-execution");
        }

        // Environment takes precedence over the equivalent CLI arguments
        cmd.env("QUEUE_ID", &self.launch.queue_id)
            .env("AGENTCTL_API_KEY", &self.launch.api_key)
            .env("CONTROL_PLANE_URL", &self.launch.control_plane_url)
            .env("LOG_LEVEL", &self.config.log_level);
        if self.config.single_execution {
            cmd.env("SINGLE_EXECUTION", "1");
        }

        {
            let proxy = self.proxy.lock().await;
            if let Some(proxy) = proxy.as_ref() {
                cmd.env("LLM_PROXY_BASE_URL", proxy.base_url());
                if let Some(key) = proxy.api_key() {
                    cmd.env("LLM_PROXY_API_KEY", key);
                }
            }
        }

        cmd.current_dir(&self.worker_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| CliError::WorkerSpawnFailed {
            message: format!("{}: {e}", self.launch.program.display()),
        })?;

        self.log(&format!(
            "worker process started with PID {}",
            child.id().unwrap_or(0)
        ));

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(spawn_output_pump(stdout, self.log_writer.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(spawn_output_pump(stderr, self.log_writer.clone()));
        }

        let outcome = tokio::select! {
            status = child.wait() => {
                let status = status.map_err(CliError::Io)?;
                RunOutcome::Exited { code: status.code(), success: status.success() }
            }
            _ = self.stop.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                RunOutcome::Interrupted
            }
        };

        for pump in pumps {
            let _ = pump.await;
        }

        Ok(outcome)
    }

    /// Supervisor-originated log line, tagged and timestamped
    fn log(&self, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = self
            .log_writer
            .write_line(&format!("[{timestamp}] [supervisor] {message}"));
    }
}

fn spawn_output_pump<R>(reader: R, writer: Arc<RotatingLogWriter>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = writer.write_line(&line);
        }
    })
}
