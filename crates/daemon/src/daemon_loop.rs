// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The loop driver shared by the schedule, sensor and run-queue loops

use crate::heartbeat::HeartbeatBoard;
use async_trait::async_trait;
use cadence_adapters::RepositoryError;
use cadence_core::{Clock, DaemonKind};
use cadence_storage::StorageError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Shortest sleep between iterations, so a trigger that stays due cannot
/// spin a loop
pub const MIN_LOOP_SLEEP: Duration = Duration::from_millis(100);

/// Faults that abort a whole iteration. The loop records them in its
/// heartbeat and carries on with the next iteration.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    /// Per-trigger errors, recorded on the heartbeat
    pub errors: Vec<String>,
    /// Sleep before the next iteration
    pub next_wait: Duration,
}

impl Iteration {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            errors: Vec::new(),
            next_wait: max_wait,
        }
    }

    /// Wake no later than `due`
    pub fn wake_at(&mut self, due: DateTime<Utc>, now: DateTime<Utc>) {
        let wait = (due - now).to_std().unwrap_or(Duration::ZERO);
        self.next_wait = self.next_wait.min(wait);
    }
}

/// One of the supervisor's long-running loops
#[async_trait]
pub trait DaemonLoop: Send + 'static {
    fn kind(&self) -> DaemonKind;

    /// Sleep after an iteration that failed outright
    fn idle_interval(&self) -> Duration;

    async fn run_iteration(&mut self) -> Result<Iteration, LoopError>;
}

/// Drive `worker` until `cancel` flips to true.
///
/// Cancellation is observed between iterations only; an iteration in
/// progress always runs to completion.
pub(crate) async fn run_loop<W: DaemonLoop, C: Clock>(
    mut worker: W,
    clock: C,
    board: HeartbeatBoard,
    mut cancel: watch::Receiver<bool>,
) {
    let kind = worker.kind();
    tracing::info!(daemon = %kind, "loop started");

    while !*cancel.borrow() {
        let (errors, wait) = match worker.run_iteration().await {
            Ok(iteration) => (iteration.errors, iteration.next_wait),
            Err(e) => {
                tracing::error!(daemon = %kind, error = %e, "iteration failed");
                (vec![e.to_string()], worker.idle_interval())
            }
        };
        if !errors.is_empty() {
            tracing::warn!(daemon = %kind, errors = errors.len(), "iteration finished with errors");
        }
        board.beat(kind, clock.now(), errors);

        tokio::select! {
            _ = tokio::time::sleep(wait.max(MIN_LOOP_SLEEP)) => {}
            changed = cancel.changed() => {
                if changed.is_err() {
                    // Supervisor dropped without stopping us
                    break;
                }
            }
        }
    }

    board.stop(kind);
    tracing::info!(daemon = %kind, "loop stopped");
}

#[cfg(test)]
#[path = "daemon_loop_tests.rs"]
mod tests;
