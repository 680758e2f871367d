// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted per-trigger evaluation state
//!
//! Only the evaluator for a trigger mutates its state, and only after a
//! successful commit of the requests the evaluation produced. `version`
//! increases by one on every commit and is the compare-and-set token the
//! store checks.

use crate::dedup::RecentKeys;
use crate::trigger::{TriggerId, TriggerKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Running,
    Stopped,
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStatus::Running => write!(f, "running"),
            TriggerStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Where evaluation of a trigger has got to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerCursor {
    Schedule {
        /// Every tick at or before this time has been processed
        last_evaluated: DateTime<Utc>,
    },
    Sensor {
        last_polled: Option<DateTime<Utc>>,
        /// Opaque value handed back to the sensor function
        cursor: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    pub id: TriggerId,
    pub status: TriggerStatus,
    pub cursor: TriggerCursor,
    pub recent_run_keys: RecentKeys,
    pub version: u64,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub backoff_until: Option<DateTime<Utc>>,
}

impl TriggerState {
    /// Fresh schedule state; ticks before `started_at` are never evaluated
    pub fn schedule(id: TriggerId, started_at: DateTime<Utc>) -> Self {
        Self::with_cursor(
            id,
            TriggerCursor::Schedule {
                last_evaluated: started_at,
            },
            0,
        )
    }

    pub fn sensor(id: TriggerId, recent_keys_capacity: usize) -> Self {
        Self::with_cursor(
            id,
            TriggerCursor::Sensor {
                last_polled: None,
                cursor: None,
            },
            recent_keys_capacity,
        )
    }

    fn with_cursor(id: TriggerId, cursor: TriggerCursor, capacity: usize) -> Self {
        Self {
            id,
            status: TriggerStatus::Running,
            cursor,
            recent_run_keys: RecentKeys::new(capacity),
            version: 0,
            last_error: None,
            consecutive_failures: 0,
            backoff_until: None,
        }
    }

    pub fn stopped(mut self) -> Self {
        self.status = TriggerStatus::Stopped;
        self
    }

    /// Stop evaluating. The cursor is kept.
    pub fn stop(&mut self) {
        self.status = TriggerStatus::Stopped;
    }

    /// Resume evaluating. A schedule restarts at `now`, so ticks that fell
    /// while it was stopped are never evaluated; a sensor keeps its cursor.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = TriggerStatus::Running;
        self.backoff_until = None;
        self.advance_schedule(now);
    }

    pub fn kind(&self) -> TriggerKind {
        match self.cursor {
            TriggerCursor::Schedule { .. } => TriggerKind::Schedule,
            TriggerCursor::Sensor { .. } => TriggerKind::Sensor,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TriggerStatus::Running
    }

    pub fn in_backoff(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }

    pub fn last_evaluated(&self) -> Option<DateTime<Utc>> {
        match self.cursor {
            TriggerCursor::Schedule { last_evaluated } => Some(last_evaluated),
            TriggerCursor::Sensor { .. } => None,
        }
    }

    pub fn last_polled(&self) -> Option<DateTime<Utc>> {
        match self.cursor {
            TriggerCursor::Sensor { last_polled, .. } => last_polled,
            TriggerCursor::Schedule { .. } => None,
        }
    }

    pub fn sensor_cursor(&self) -> Option<&str> {
        match &self.cursor {
            TriggerCursor::Sensor { cursor, .. } => cursor.as_deref(),
            TriggerCursor::Schedule { .. } => None,
        }
    }

    /// Advance a schedule cursor. Never moves backwards.
    pub fn advance_schedule(&mut self, to: DateTime<Utc>) {
        if let TriggerCursor::Schedule { last_evaluated } = &mut self.cursor {
            if to > *last_evaluated {
                *last_evaluated = to;
            }
        }
    }

    /// Record a sensor poll. A `None` cursor keeps the previous one.
    pub fn record_poll(&mut self, at: DateTime<Utc>, new_cursor: Option<String>) {
        if let TriggerCursor::Sensor {
            last_polled,
            cursor,
        } = &mut self.cursor
        {
            if last_polled.is_none_or(|prev| at >= prev) {
                *last_polled = Some(at);
            }
            if new_cursor.is_some() {
                *cursor = new_cursor;
            }
        }
    }

    pub fn record_success(&mut self) {
        self.last_error = None;
        self.consecutive_failures = 0;
        self.backoff_until = None;
    }

    pub fn record_error(&mut self, error: impl Into<String>, backoff_until: Option<DateTime<Utc>>) {
        self.last_error = Some(error.into());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.backoff_until = backoff_until;
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
