// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued run state machine
//!
//! A queued run moves `Queued -> Starting -> Started | FailedToStart`.
//! `Started` and `FailedToStart` are terminal; a failed launch is never
//! retried automatically.

use crate::request::RunRequest;
use crate::trigger::TriggerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Starting,
    Started,
    FailedToStart,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Started | RunStatus::FailedToStart)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::Starting => write!(f, "starting"),
            RunStatus::Started => write!(f, "started"),
            RunStatus::FailedToStart => write!(f, "failed_to_start"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "starting" => Ok(RunStatus::Starting),
            "started" => Ok(RunStatus::Started),
            "failed_to_start" => Ok(RunStatus::FailedToStart),
            _ => Err(format!("unknown run status: {}", s)),
        }
    }
}

/// Events that move a queued run through its lifecycle
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Picked off the queue, launch about to begin
    Dequeue,
    /// Launcher reported the run started
    Launched,
    /// Launcher could not start the run
    LaunchFailed { error: String },
}

/// A run request bound to a run id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRun {
    pub id: RunId,
    pub request: RunRequest,
    /// Trigger that produced the request, if any
    pub origin: Option<TriggerId>,
    pub status: RunStatus,
    pub queued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl QueuedRun {
    pub fn new(
        id: RunId,
        request: RunRequest,
        origin: Option<TriggerId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            request,
            origin,
            status: RunStatus::Queued,
            queued_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn run_key(&self) -> Option<&str> {
        self.request.run_key.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pure state transition; invalid transitions return an unchanged copy
    pub fn transition(&self, event: RunEvent, now: DateTime<Utc>) -> Self {
        match (self.status, event) {
            (RunStatus::Queued, RunEvent::Dequeue) => QueuedRun {
                status: RunStatus::Starting,
                updated_at: now,
                ..self.clone()
            },
            (RunStatus::Starting, RunEvent::Launched) => QueuedRun {
                status: RunStatus::Started,
                updated_at: now,
                ..self.clone()
            },
            (RunStatus::Queued | RunStatus::Starting, RunEvent::LaunchFailed { error }) => {
                QueuedRun {
                    status: RunStatus::FailedToStart,
                    updated_at: now,
                    error: Some(error),
                    ..self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
