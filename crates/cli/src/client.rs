// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use cadence_core::Heartbeat;
use cadence_daemon::protocol::{self, ProtocolError};
use cadence_daemon::{Paths, Request, Response};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::net::UnixStream;

/// Timeout from a millisecond env var, or `default`
fn env_timeout(var: &str, default: Duration) -> Duration {
    match std::env::var(var).ok().and_then(|ms| ms.parse::<u64>().ok()) {
        Some(ms) => Duration::from_millis(ms),
        None => default,
    }
}

/// Per-message timeout for requests to a running daemon
pub fn timeout_ipc() -> Duration {
    env_timeout("CADENCE_TIMEOUT_IPC_MS", Duration::from_secs(5))
}

/// How long `daemon start` waits for the socket to appear
pub fn timeout_connect() -> Duration {
    env_timeout("CADENCE_TIMEOUT_CONNECT_MS", Duration::from_secs(5))
}

/// How long to wait for the daemon process to exit.
///
/// Covers the daemon waiting on launched runs, so it is longer than the
/// other timeouts.
pub fn timeout_exit() -> Duration {
    env_timeout("CADENCE_TIMEOUT_EXIT_MS", Duration::from_secs(10))
}

fn poll_interval() -> Duration {
    env_timeout("CADENCE_POLL_INTERVAL_MS", Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Daemon error: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state as reported by `Status`
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub uptime: Duration,
    pub loops: Vec<Heartbeat>,
    pub queued_runs: usize,
}

/// Outcome of a health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy(Vec<String>),
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an existing daemon (no auto-start)
    pub fn connect(paths: &Paths) -> Result<Self, ClientError> {
        if !paths.socket.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self {
            socket_path: paths.socket.clone(),
        })
    }

    /// Start `cadenced` for `config_path` and wait until it accepts connections
    pub fn start(config_path: &Path, paths: &Paths) -> Result<Self, ClientError> {
        let child = start_daemon_background(config_path)?;
        Self::connect_with_retry(paths, timeout_connect(), child)
    }

    fn connect_with_retry(
        paths: &Paths,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Daemon exited early: startup failed
            if let Ok(Some(status)) = child.try_wait() {
                // The log may lag the exit slightly
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(&paths.log) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    std::thread::sleep(poll_interval());
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(paths) {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    std::thread::sleep(poll_interval());
                }
                Err(e) => return Err(wrap_with_startup_error(e, &paths.log)),
            }
        }

        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            &paths.log,
        ))
    }

    /// One request/response exchange on a fresh connection
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        protocol::write_request(&mut writer, &request, timeout_ipc()).await?;
        Ok(protocol::read_response(&mut reader, timeout_ipc()).await?)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                loops,
                queued_runs,
            } => Ok(DaemonStatus {
                uptime: Duration::from_secs(uptime_secs),
                loops,
                queued_runs,
            }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Are all daemon loops still alive?
    pub async fn check_threads(&self) -> Result<Health, ClientError> {
        health(self.send(Request::CheckThreads).await?)
    }

    /// Has every loop completed an iteration within `max_age`?
    ///
    /// `None` uses the daemon's configured tolerance.
    pub async fn check_heartbeats(&self, max_age: Option<Duration>) -> Result<Health, ClientError> {
        let request = Request::CheckHeartbeats {
            max_age_secs: max_age.map(|d| d.as_secs()),
        };
        health(self.send(request).await?)
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn health(response: Response) -> Result<Health, ClientError> {
    match response {
        Response::Healthy => Ok(Health::Healthy),
        Response::Unhealthy { failures } => Ok(Health::Unhealthy(failures)),
        Response::Error { message } => Err(ClientError::Rejected(message)),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(config_path: &Path) -> Result<std::process::Child, ClientError> {
    let cadenced = find_daemon_binary();

    Command::new(&cadenced)
        .arg(config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", cadenced.display(), e)))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(paths: &Paths) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(paths) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(paths);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(paths) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(paths);
    // A killed daemon leaves its socket behind
    if paths.socket.exists() {
        let _ = std::fs::remove_file(&paths.socket);
    }

    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the cadenced binary
fn find_daemon_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("CADENCE_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Installed side by side with the CLI
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("cadenced");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("cadenced")
}

/// Remove a PID file whose daemon is gone.
///
/// Only called once the daemon is known to be stopped; a daemon that is
/// still starting up owns its PID file.
fn cleanup_stale_pid(paths: &Paths) {
    let Some(pid) = read_daemon_pid(paths) else {
        return;
    };
    if !process_exists(pid) {
        let _ = std::fs::remove_file(&paths.lock);
    }
}

/// Get the PID from the daemon lock file, if it exists
pub fn read_daemon_pid(paths: &Paths) -> Option<u32> {
    let content = std::fs::read_to_string(&paths.lock).ok()?;
    content.trim().parse::<u32>().ok()
}

/// Signal 0 probes for the process without disturbing it
pub fn process_exists(pid: u32) -> bool {
    signal_daemon(pid, None)
}

pub fn force_kill_daemon(pid: u32) -> bool {
    signal_daemon(pid, Some(Signal::SIGKILL))
}

fn signal_daemon(pid: u32, signal: Option<Signal>) -> bool {
    match i32::try_from(pid) {
        Ok(raw) => kill(Pid::from_raw(raw), signal).is_ok(),
        Err(_) => false,
    }
}

/// Startup marker prefix that the daemon writes to its log before anything else.
/// Full format: "--- cadenced: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- cadenced: starting (pid: ";

const START_FAILED: &str = "Failed to start daemon: ";

/// Read the daemon log from the last startup marker, looking for the error
/// the daemon wrote before exiting
pub fn read_startup_error(log: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log).ok()?;

    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let messages: Vec<&str> = content[start_pos..]
        .lines()
        .filter_map(|line| line.split_once(START_FAILED))
        .map(|(_, message)| message)
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

/// Replace `err` with the daemon's own startup error when its log has one
fn wrap_with_startup_error(err: ClientError, log: &Path) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error(log) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
