// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run requests and the results returned by trigger evaluation functions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Well-known tags stamped onto requests by the daemon
pub mod tags {
    pub const SCHEDULE_NAME: &str = "cadence/schedule_name";
    pub const SCHEDULED_EXECUTION_TIME: &str = "cadence/scheduled_execution_time";
    pub const SENSOR_NAME: &str = "cadence/sensor_name";
    pub const REPOSITORY: &str = "cadence/repository";
}

/// A request to execute one run of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Idempotency key. `None` means the request is never deduplicated.
    #[serde(default)]
    pub run_key: Option<String>,
    /// Opaque execution configuration handed to the launcher
    #[serde(default)]
    pub run_config: Map<String, Value>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Job to run; defaults to the trigger's job when absent
    #[serde(default)]
    pub job_name: Option<String>,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_key(mut self, key: impl Into<String>) -> Self {
        self.run_key = Some(key.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.run_config.insert(key.into(), value);
        self
    }

    pub fn with_job(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }
}

/// What a schedule or sensor evaluation function returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default)]
    pub run_requests: Vec<RunRequest>,
    /// New sensor cursor; ignored for schedules
    #[serde(default)]
    pub cursor: Option<String>,
    /// Set when the function decided not to request a run
    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl EvaluationResult {
    pub fn requests(run_requests: Vec<RunRequest>) -> Self {
        Self {
            run_requests,
            ..Self::default()
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skip_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}
