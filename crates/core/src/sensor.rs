// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure poll planning for sensors

use crate::dedup::RecentKeys;
use crate::request::{tags, RunRequest};
use crate::state::TriggerState;
use crate::trigger::{TriggerDefinition, TriggerId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// Whether enough time has passed since the last poll
pub fn is_due(state: &TriggerState, minimum_interval: Duration, now: DateTime<Utc>) -> bool {
    let Some(last) = state.last_polled() else {
        return true;
    };
    let interval = chrono::Duration::from_std(minimum_interval).unwrap_or(chrono::Duration::MAX);
    now - last >= interval
}

/// When the sensor next becomes due
pub fn next_due(state: &TriggerState, minimum_interval: Duration) -> Option<DateTime<Utc>> {
    let last = state.last_polled()?;
    let interval = chrono::Duration::from_std(minimum_interval).ok()?;
    last.checked_add_signed(interval)
}

/// Stored run key for a user-supplied sensor key
pub fn sensor_run_key(id: &TriggerId, key: &str) -> String {
    format!("{}:{}", id, key)
}

/// Requests that survived deduplication
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorBatch {
    pub requests: Vec<RunRequest>,
    /// Run keys dropped because they were seen recently
    pub suppressed: Vec<String>,
}

/// Stamp and deduplicate the requests from one poll.
///
/// Requests without a run key always pass. Keyed requests are checked
/// against `recent` (and each other) and the surviving keys are recorded in
/// `recent`, which the caller commits together with the requests.
pub fn sensor_requests(
    def: &TriggerDefinition,
    requests: Vec<RunRequest>,
    recent: &mut RecentKeys,
) -> SensorBatch {
    let mut batch = SensorBatch::default();
    let mut in_batch = HashSet::new();

    for mut request in requests {
        if let Some(key) = request.run_key.take() {
            let stored = sensor_run_key(&def.id, &key);
            if recent.contains(&stored) || !in_batch.insert(stored.clone()) {
                batch.suppressed.push(stored);
                continue;
            }
            recent.insert(stored.clone());
            request.run_key = Some(stored);
        }
        request.job_name.get_or_insert_with(|| def.job_name.clone());
        request
            .tags
            .insert(tags::SENSOR_NAME.to_string(), def.id.name.clone());
        request
            .tags
            .insert(tags::REPOSITORY.to_string(), def.id.repository.clone());
        batch.requests.push(request);
    }

    batch
}

#[cfg(test)]
#[path = "sensor_tests.rs"]
mod tests;
