// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cadence_adapters::{
    CommandRepository, LaunchError, NoOpRunLauncher, ProcessRunLauncher, RunLauncher,
    TracedRepository, TracedRunLauncher,
};
use cadence_core::{QueuedRun, RunId, SystemClock, UuidIdGen};
use cadence_daemon::{Config, ConfigError, DaemonConfig, DaemonDeps, Paths, Supervisor};
use cadence_storage::{Storage, StorageError, Store};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Launcher picked by the `[launcher]` config section
#[derive(Clone)]
pub enum DaemonLauncher {
    Process(ProcessRunLauncher),
    /// No `[launcher]` section: runs are marked started and nothing executes
    NoOp(NoOpRunLauncher),
}

#[async_trait]
impl RunLauncher for DaemonLauncher {
    async fn launch(&self, run: &QueuedRun) -> Result<(), LaunchError> {
        match self {
            DaemonLauncher::Process(l) => l.launch(run).await,
            DaemonLauncher::NoOp(l) => l.launch(run).await,
        }
    }

    async fn active_runs(&self) -> Vec<RunId> {
        match self {
            DaemonLauncher::Process(l) => l.active_runs().await,
            DaemonLauncher::NoOp(l) => l.active_runs().await,
        }
    }

    async fn shutdown(&self, wait: bool) {
        match self {
            DaemonLauncher::Process(l) => l.shutdown(wait).await,
            DaemonLauncher::NoOp(l) => l.shutdown(wait).await,
        }
    }
}

/// Supervisor with concrete adapter types (wrapped with tracing)
pub type DaemonSupervisor = Supervisor<
    TracedRepository<CommandRepository>,
    TracedRunLauncher<DaemonLauncher>,
    SystemClock,
    UuidIdGen,
>;

/// Daemon state during operation
pub struct DaemonState {
    pub paths: Paths,
    pub config: Arc<DaemonConfig>,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    pub supervisor: DaemonSupervisor,
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// Stop the loops, then remove the files that advertise a running daemon
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.supervisor
            .stop(self.config.wait_for_processes)
            .await;

        for path in [&self.paths.socket, &self.paths.lock, &self.paths.version] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not determine log directory")]
    NoLogDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: Config, paths: &Paths) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config, paths).await {
        Ok(state) => Ok(state),
        // The files belong to the daemon holding the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(paths);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: Config, paths: &Paths) -> Result<DaemonState, LifecycleError> {
    // 1. Acquire lock file FIRST - prevents races
    std::fs::create_dir_all(&paths.state_dir)?;
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.lock)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 2. Create directories
    if let Some(parent) = paths.socket.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = paths.wal.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&paths.run_logs)?;

    // Write version file
    std::fs::write(&paths.version, env!("CARGO_PKG_VERSION"))?;

    // 3. Resolve triggers BEFORE binding socket (fail fast)
    let triggers = config.triggers()?;
    info!("Loaded {} triggers", triggers.len());

    // 4. Load state from WAL
    let store = Store::open(&paths.wal)?;
    info!(
        "Loaded state: {} triggers, {} runs",
        store.trigger_states()?.len(),
        store.run_count()
    );

    // 5. Set up adapters (wrapped with tracing for observability)
    let repository = TracedRepository::new(CommandRepository::new(
        paths.workspace.clone(),
        triggers,
    ));
    let launcher = TracedRunLauncher::new(build_launcher(&config, paths));
    let daemon_config = Arc::new(config.daemon);

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if paths.socket.exists() {
        std::fs::remove_file(&paths.socket)?;
    }
    let listener = UnixListener::bind(&paths.socket)
        .map_err(|e| LifecycleError::BindFailed(paths.socket.clone(), e))?;

    // 7. Start the loops
    let mut supervisor = Supervisor::new(
        DaemonDeps {
            repository,
            launcher,
            store: Arc::new(store),
            clock: SystemClock,
            id_gen: UuidIdGen,
        },
        Arc::clone(&daemon_config),
    );
    supervisor.start()?;

    info!("Daemon started for {}", paths.workspace.display());

    Ok(DaemonState {
        paths: paths.clone(),
        config: daemon_config,
        lock_file,
        listener,
        supervisor,
        shutdown_requested: false,
    })
}

fn build_launcher(config: &Config, paths: &Paths) -> DaemonLauncher {
    match &config.launcher {
        Some(launcher) => DaemonLauncher::Process(
            ProcessRunLauncher::new(&launcher.command, paths.workspace.clone())
                .with_log_dir(paths.run_logs.clone()),
        ),
        None => {
            warn!("no [launcher] configured, runs will not execute");
            DaemonLauncher::NoOp(NoOpRunLauncher::new())
        }
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(paths: &Paths) {
    for path in [&paths.socket, &paths.version, &paths.lock] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Parent directory and file name of the log file
pub fn log_location(log: &Path) -> Result<(&Path, &std::ffi::OsStr), LifecycleError> {
    let dir = log.parent().ok_or(LifecycleError::NoLogDir)?;
    let file = log.file_name().ok_or(LifecycleError::NoLogDir)?;
    Ok((dir, file))
}
