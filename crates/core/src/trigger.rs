// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger definitions: the schedules and sensors a repository exposes
//!
//! Definitions are immutable values. A code reload replaces the whole set
//! rather than editing definitions in place.

use crate::cron::CronSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identity of a trigger: the owning repository plus the trigger name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId {
    pub repository: String,
    pub name: String,
}

impl TriggerId {
    pub fn new(repository: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.name)
    }
}

/// Whether a trigger is time-based or event-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Schedule,
    Sensor,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Schedule => write!(f, "schedule"),
            TriggerKind::Sensor => write!(f, "sensor"),
        }
    }
}

/// How often a trigger is evaluated
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Schedule ticks on a cron expression
    Cron(CronSchedule),
    /// Sensor polled no more often than this
    MinimumInterval(Duration),
}

/// A schedule or sensor loaded from a repository
#[derive(Debug, Clone)]
pub struct TriggerDefinition {
    pub id: TriggerId,
    /// Job launched by requests from this trigger
    pub job_name: String,
    pub cadence: Cadence,
    /// Whether the trigger should be evaluated; reconciled into the stored
    /// status on every evaluation
    pub enabled: bool,
}

impl TriggerDefinition {
    pub fn schedule(id: TriggerId, job_name: impl Into<String>, cron: CronSchedule) -> Self {
        Self {
            id,
            job_name: job_name.into(),
            cadence: Cadence::Cron(cron),
            enabled: true,
        }
    }

    pub fn sensor(id: TriggerId, job_name: impl Into<String>, minimum_interval: Duration) -> Self {
        Self {
            id,
            job_name: job_name.into(),
            cadence: Cadence::MinimumInterval(minimum_interval),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn kind(&self) -> TriggerKind {
        match self.cadence {
            Cadence::Cron(_) => TriggerKind::Schedule,
            Cadence::MinimumInterval(_) => TriggerKind::Sensor,
        }
    }

    pub fn cron(&self) -> Option<&CronSchedule> {
        match &self.cadence {
            Cadence::Cron(cron) => Some(cron),
            Cadence::MinimumInterval(_) => None,
        }
    }

    pub fn minimum_interval(&self) -> Option<Duration> {
        match self.cadence {
            Cadence::MinimumInterval(interval) => Some(interval),
            Cadence::Cron(_) => None,
        }
    }
}
