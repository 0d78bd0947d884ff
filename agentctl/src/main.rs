//! Main entry point for the agentctl binary

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use agentctl::config;
use agentctl::error::{CliError, CliResult};
use agentctl::execenv::{self, ExecEnvArgs};
use agentctl::orchestrator::{
    shutdown_signal, ExecutionOrchestrator, ExecutionRequest, ExecutionTarget, OrchestratorConfig,
    QueueSelector,
};
use agentctl::services::daemon;
use agentctl::services::readiness::{
    ReadinessInfo, ReadinessListener, ReadinessSignaler, DEFAULT_READY_TIMEOUT, READY_ADDR_ENV,
};
use agentctl::services::supervisor::SupervisorConfig;
use agentctl::services::{ConsoleSink, LocalWorkerRunner, RealControlPlane, WorkerRunnerSettings};
use agentctl::traits::WorkerRunner;
use shared::{logging, ComponentId};

/// Drive agent and team executions on the control plane, locally or on the fleet
#[derive(Parser)]
#[command(name = "agentctl")]
#[command(about = "Execute agents and teams via the control plane, with local worker support")]
struct Args {
    /// Control plane base URL (falls back to environment configuration)
    #[arg(long, global = true)]
    control_plane_url: Option<String>,

    /// API key (falls back to AGENTCTL_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit an execution and stream its output
    Exec {
        /// Agent ID to execute
        #[arg(long, conflicts_with = "team")]
        agent: Option<String>,

        /// Team ID to execute
        #[arg(long)]
        team: Option<String>,

        /// Prompt for the execution
        #[arg(long)]
        prompt: String,

        /// Target queue IDs (repeatable; more than one runs in parallel)
        #[arg(long = "queue")]
        queues: Vec<String>,

        /// Target queue names (repeatable; resolved against the queue listing)
        #[arg(long = "queue-name")]
        queue_names: Vec<String>,

        /// Run on this machine via an ephemeral local worker
        #[arg(long)]
        local: bool,

        /// Environment hosting the ephemeral queue (local mode)
        #[arg(long, default_value = "default")]
        environment: String,

        /// Worker runtime executable for local mode
        #[arg(long, default_value = "agent-worker")]
        runtime: PathBuf,

        /// Link to a parent execution for conversation continuation
        #[arg(long)]
        parent_execution: Option<String>,

        /// Working directory override for the worker
        #[arg(long)]
        working_dir: Option<String>,

        /// Extra environment variables (KEY=VALUE, repeatable)
        #[arg(long = "env")]
        env_vars: Vec<String>,

        /// Load environment variables from a file
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Secrets for the server to inject (repeatable)
        #[arg(long = "secret")]
        secrets: Vec<String>,

        /// Execution timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage local workers
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },
}

#[derive(Subcommand)]
enum WorkerCommand {
    /// Start a worker for a queue
    Start {
        #[arg(long)]
        queue_id: String,

        /// Run in the background and return once the worker is ready
        #[arg(long)]
        daemon: bool,

        /// Worker runtime executable
        #[arg(long, default_value = "agent-worker")]
        runtime: PathBuf,
    },

    /// Stop a running daemonized worker
    Stop {
        #[arg(long)]
        queue_id: String,
    },

    /// Show the status of a daemonized worker
    Status {
        #[arg(long)]
        queue_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if matches!(args.command, Command::Worker { .. }) && config::is_daemon_child() {
        ComponentId::init_worker();
    } else {
        ComponentId::init_cli();
    }
    logging::init_tracing(Some(&args.log_level));

    let control_plane_url = config::resolve_control_plane_url(args.control_plane_url.as_deref());
    let api_key =
        config::resolve_api_key(args.api_key.as_deref()).ok_or_else(|| CliError::ConfigurationError {
            message: "no API key provided (set AGENTCTL_API_KEY or pass --api-key)".to_string(),
        })?;

    let client = controlplane::Client::new(&control_plane_url, api_key.clone())
        .map_err(CliError::from)?;
    let api = Arc::new(RealControlPlane::new(client));

    match args.command {
        Command::Exec {
            agent,
            team,
            prompt,
            queues,
            queue_names,
            local,
            environment,
            runtime,
            parent_execution,
            working_dir,
            env_vars,
            env_file,
            secrets,
            timeout,
        } => {
            let target = match (agent, team) {
                (Some(agent), None) => ExecutionTarget::Agent(agent),
                (None, Some(team)) => ExecutionTarget::Team(team),
                _ => {
                    return Err(CliError::ConfigurationError {
                        message: "exactly one of --agent or --team is required".to_string(),
                    }
                    .into())
                }
            };

            let environment_override = execenv::build_override(&ExecEnvArgs {
                env_vars,
                env_file,
                working_dir,
                secrets,
                timeout_seconds: timeout,
            })?;

            let request = ExecutionRequest {
                target,
                prompt,
                parent_execution_id: parent_execution,
                environment: environment_override,
            };

            let mut settings = WorkerRunnerSettings::new(
                runtime,
                api_key,
                control_plane_url,
                config::worker_root(),
            );
            settings.max_log_size = config::max_log_size();
            settings.supervisor = SupervisorConfig {
                single_execution: true,
                log_level: args.log_level.clone(),
                ..SupervisorConfig::default()
            };

            let runner = Arc::new(LocalWorkerRunner::new(api.clone(), settings));
            let sink = Arc::new(ConsoleSink);
            let orchestrator =
                ExecutionOrchestrator::new(api, sink, runner, OrchestratorConfig::new(environment));

            if local {
                orchestrator.execute_local(&request).await?;
            } else if !queues.is_empty() {
                orchestrator
                    .execute(&request, &QueueSelector::Ids(queues))
                    .await?;
            } else if !queue_names.is_empty() {
                orchestrator
                    .execute(&request, &QueueSelector::Names(queue_names))
                    .await?;
            } else {
                orchestrator.execute(&request, &QueueSelector::Auto).await?;
            }
        }

        Command::Worker { command } => match command {
            WorkerCommand::Start {
                queue_id,
                daemon,
                runtime,
            } => {
                run_worker_start(
                    api,
                    queue_id,
                    daemon,
                    runtime,
                    api_key,
                    control_plane_url,
                    args.log_level,
                )
                .await?;
            }
            WorkerCommand::Stop { queue_id } => {
                let pid_file = config::worker_root()
                    .join(&queue_id)
                    .join(daemon::PID_FILE_NAME);
                let info = daemon::stop_daemon(&pid_file, Duration::from_secs(30)).await?;
                println!(
                    "stopped worker for queue {} (was PID {})",
                    info.queue_id, info.pid
                );
            }
            WorkerCommand::Status { queue_id } => {
                let pid_file = config::worker_root()
                    .join(&queue_id)
                    .join(daemon::PID_FILE_NAME);
                let info = daemon::read_daemon_info(&pid_file)?;
                let state = if daemon::is_process_running(info.pid) {
                    "running"
                } else {
                    "not running"
                };
                println!(
                    "worker for queue {}: PID {} ({state}), log {}",
                    info.queue_id,
                    info.pid,
                    info.log_file.display()
                );
            }
        },
    }

    Ok(())
}

/// Foreground supervision, or the parent half of daemonization
async fn run_worker_start(
    api: Arc<RealControlPlane>,
    queue_id: String,
    daemon_mode: bool,
    runtime: PathBuf,
    api_key: String,
    control_plane_url: String,
    log_level: String,
) -> CliResult<()> {
    if daemon_mode && !config::is_daemon_child() {
        return daemonize(&queue_id, &runtime).await;
    }

    logging::log_startup(
        &ComponentId::current(),
        &format!("worker supervisor for queue {queue_id}"),
    );

    let mut settings = WorkerRunnerSettings::new(
        runtime,
        api_key,
        control_plane_url.clone(),
        config::worker_root(),
    );
    settings.max_log_size = config::max_log_size();
    settings.supervisor.log_level = log_level;

    let runner = LocalWorkerRunner::new(api, settings);

    // Report readiness to a waiting parent, if any
    let signaler = ReadinessSignaler::from_env();
    let info = ReadinessInfo {
        pid: std::process::id(),
        queue_id: queue_id.clone(),
        control_plane_url,
        worker_dir: config::worker_root().join(&queue_id),
        start_time: chrono::Utc::now(),
    };
    if let Err(e) = signaler.signal_ready(&info).await {
        eprintln!("warning: failed to signal readiness to parent: {e}");
    }

    let cancel = tokio_util::sync::CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        })
    };

    let result = runner.run(&queue_id, cancel).await;
    watcher.abort();
    if result.is_ok() {
        logging::log_success(&ComponentId::current(), "worker supervisor stopped");
    }
    result
}

/// Re-execute ourselves detached and wait for the child's readiness report
async fn daemonize(queue_id: &str, runtime: &Path) -> CliResult<()> {
    let listener = ReadinessListener::bind().await?;
    let rendezvous = listener.rendezvous_addr();

    let exe = std::env::current_exe()?;
    let mut cmd = std::process::Command::new(exe);
    cmd.arg("worker")
        .arg("start")
        .arg("--queue-id")
        .arg(queue_id)
        .arg("--daemon")
        .arg("--runtime")
        .arg(runtime)
        .env(config::DAEMON_CHILD_ENV, "1")
        .env(READY_ADDR_ENV, rendezvous.to_string())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let _child = cmd.spawn().map_err(|e| CliError::WorkerSpawnFailed {
        message: format!("failed to daemonize: {e}"),
    })?;

    let info = listener.wait_for_ready(DEFAULT_READY_TIMEOUT).await?;
    println!(
        "worker daemon started: PID {}, queue {}, logs at {}",
        info.pid,
        info.queue_id,
        info.worker_dir.join(daemon::LOG_FILE_NAME).display()
    );
    Ok(())
}
