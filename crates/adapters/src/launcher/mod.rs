// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run launchers: start execution of queued runs

mod noop;
mod process;

pub use noop::NoOpRunLauncher;
pub use process::ProcessRunLauncher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRunLauncher, LaunchCall};

use async_trait::async_trait;
use cadence_core::{QueuedRun, RunId};
use thiserror::Error;

/// Why a run could not be started. Launch failures are terminal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaunchError {
    #[error("run {0} has no job to launch")]
    MissingJob(RunId),
    #[error("failed to spawn run {run}: {message}")]
    SpawnFailed { run: RunId, message: String },
    #[error("launcher rejected run {run}: {message}")]
    Rejected { run: RunId, message: String },
}

/// Adapter that starts runs outside the daemon
#[async_trait]
pub trait RunLauncher: Clone + Send + Sync + 'static {
    /// Start the run. `Ok` means the execution is underway.
    async fn launch(&self, run: &QueuedRun) -> Result<(), LaunchError>;

    /// Runs started by this launcher that are still executing
    async fn active_runs(&self) -> Vec<RunId>;

    /// Wait for launched executions to exit, or terminate them when `wait`
    /// is false
    async fn shutdown(&self, wait: bool);
}
