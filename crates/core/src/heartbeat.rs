// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness signals emitted by daemon loops

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors kept on a heartbeat; older ones are dropped
pub const MAX_HEARTBEAT_ERRORS: usize = 10;

/// The long-running loops owned by the daemon supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonKind {
    Scheduler,
    Sensor,
    RunQueue,
}

impl DaemonKind {
    pub const ALL: [DaemonKind; 3] = [DaemonKind::Scheduler, DaemonKind::Sensor, DaemonKind::RunQueue];
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonKind::Scheduler => write!(f, "scheduler"),
            DaemonKind::Sensor => write!(f, "sensor"),
            DaemonKind::RunQueue => write!(f, "run_queue"),
        }
    }
}

/// Lifecycle of a single loop: `Starting -> Running -> (Error -> Running)* -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Starting,
    Running,
    Error,
    Stopped,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Starting => write!(f, "starting"),
            LoopStatus::Running => write!(f, "running"),
            LoopStatus::Error => write!(f, "error"),
            LoopStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub daemon: DaemonKind,
    /// When the loop last finished an iteration; `None` until the first one
    pub timestamp: Option<DateTime<Utc>>,
    pub status: LoopStatus,
    pub iterations: u64,
    /// Errors from the most recent iteration
    pub errors: Vec<String>,
}

impl Heartbeat {
    pub fn starting(daemon: DaemonKind) -> Self {
        Self {
            daemon,
            timestamp: None,
            status: LoopStatus::Starting,
            iterations: 0,
            errors: Vec::new(),
        }
    }

    /// Record a completed iteration
    pub fn beat(&mut self, now: DateTime<Utc>, mut errors: Vec<String>) {
        if errors.len() > MAX_HEARTBEAT_ERRORS {
            errors.drain(..errors.len() - MAX_HEARTBEAT_ERRORS);
        }
        self.status = if errors.is_empty() {
            LoopStatus::Running
        } else {
            LoopStatus::Error
        };
        self.timestamp = Some(now);
        self.iterations = self.iterations.saturating_add(1);
        self.errors = errors;
    }

    pub fn stop(&mut self) {
        self.status = LoopStatus::Stopped;
    }

    /// Whether the last beat is older than `max_age` at `now`.
    ///
    /// A loop that never beat is stale once `started_at + max_age` passes.
    pub fn is_stale(
        &self,
        now: DateTime<Utc>,
        started_at: DateTime<Utc>,
        max_age: chrono::Duration,
    ) -> bool {
        let last = self.timestamp.unwrap_or(started_at);
        now - last > max_age
    }
}
