// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure tick planning for schedules
//!
//! The daemon's schedule evaluator asks for the ticks due since the last
//! evaluation, calls the user function once per tick, and stamps each
//! resulting request with a run key derived from the trigger and the tick.

use crate::cron::CronSchedule;
use crate::request::{tags, EvaluationResult, RunRequest};
use crate::trigger::{TriggerDefinition, TriggerId};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::collections::VecDeque;

/// Skipped ticks before the evaluated window are counted up to this many
pub const MAX_COUNTED_SKIPS: usize = 1_000;

/// Ticks to evaluate in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickPlan {
    /// Most recent due ticks, oldest first
    pub ticks: Vec<DateTime<Utc>>,
    /// Due ticks dropped by the catch-up cap, saturating at
    /// [`MAX_COUNTED_SKIPS`]
    pub skipped: usize,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Ticks in `(last_evaluated, now]`, keeping only the latest `max_catchup`.
///
/// The search widens a window backwards from `now`, doubling it until it
/// holds `max_catchup` ticks or reaches `last_evaluated`, so the work
/// follows the cap rather than the length of the downtime.
pub fn plan_ticks(
    cron: &CronSchedule,
    last_evaluated: DateTime<Utc>,
    now: DateTime<Utc>,
    max_catchup: usize,
) -> TickPlan {
    let cap = max_catchup.max(1);
    let mut span = TimeDelta::seconds(1);

    let (window_start, mut ticks) = loop {
        let start = now
            .checked_sub_signed(span)
            .filter(|start| *start > last_evaluated)
            .unwrap_or(last_evaluated);
        let ticks: VecDeque<_> = cron.ticks_between(start, now).collect();
        if ticks.len() >= cap || start == last_evaluated {
            break (start, ticks);
        }
        span = span.checked_mul(2).unwrap_or(TimeDelta::MAX);
    };

    let mut skipped = 0;
    while ticks.len() > cap {
        ticks.pop_front();
        skipped += 1;
    }
    if window_start > last_evaluated {
        skipped += cron
            .ticks_between(last_evaluated, window_start)
            .take(MAX_COUNTED_SKIPS)
            .count();
    }

    TickPlan {
        ticks: ticks.into(),
        skipped: skipped.min(MAX_COUNTED_SKIPS),
    }
}

/// Run key for a request produced at `tick`
pub fn schedule_run_key(id: &TriggerId, tick: DateTime<Utc>, user_key: Option<&str>) -> String {
    let tick = tick.to_rfc3339_opts(SecondsFormat::Secs, true);
    match user_key {
        Some(key) => format!("{}@{}:{}", id, tick, key),
        None => format!("{}@{}", id, tick),
    }
}

/// Turn the user function's result for one tick into run requests
pub fn schedule_requests(
    def: &TriggerDefinition,
    tick: DateTime<Utc>,
    result: EvaluationResult,
) -> Vec<RunRequest> {
    if result.skip_reason.is_some() {
        return Vec::new();
    }

    let mut seen = std::collections::HashSet::new();
    result
        .run_requests
        .into_iter()
        .filter_map(|mut request| {
            let key = schedule_run_key(&def.id, tick, request.run_key.as_deref());
            if !seen.insert(key.clone()) {
                return None;
            }
            request.run_key = Some(key);
            request.job_name.get_or_insert_with(|| def.job_name.clone());
            request
                .tags
                .insert(tags::SCHEDULE_NAME.to_string(), def.id.name.clone());
            request.tags.insert(
                tags::SCHEDULED_EXECUTION_TIME.to_string(),
                tick.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
            request
                .tags
                .insert(tags::REPOSITORY.to_string(), def.id.repository.clone());
            Some(request)
        })
        .collect()
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
