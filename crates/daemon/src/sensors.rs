// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensor poll evaluator and the sensor loop
//!
//! A sensor is polled once its minimum interval has passed since the last
//! poll. The poll's runs, the cursor it returned and the run keys it used
//! are committed together, so the next poll sees the cursor only if its
//! runs were recorded.

use crate::config::DaemonConfig;
use crate::daemon_loop::{DaemonLoop, Iteration, LoopError};
use crate::evaluation::{backoff_until, bounded, bounded_listing, commit, load_state};
use async_trait::async_trait;
use cadence_adapters::Repository;
use cadence_core::sensor::{is_due, next_due, sensor_requests};
use cadence_core::{
    Clock, DaemonKind, IdGen, QueuedRun, RunId, TriggerDefinition, TriggerKind, TriggerState,
};
use cadence_storage::{Storage, StorageError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What one sensor evaluation did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReport {
    /// Whether the sensor function was called
    pub polled: bool,
    pub queued: Vec<RunId>,
    /// Run keys dropped as already requested
    pub suppressed: Vec<String>,
    pub errors: Vec<String>,
    pub next_due: Option<DateTime<Utc>>,
}

/// Polls sensors against the repository and commits the results
pub struct SensorEvaluator<R, I> {
    repository: R,
    store: Arc<dyn Storage>,
    id_gen: I,
    config: Arc<DaemonConfig>,
}

impl<R: Repository, I: IdGen> SensorEvaluator<R, I> {
    pub fn new(repository: R, store: Arc<dyn Storage>, id_gen: I, config: Arc<DaemonConfig>) -> Self {
        Self {
            repository,
            store,
            id_gen,
            config,
        }
    }

    pub async fn definitions(&self) -> Result<Vec<TriggerDefinition>, LoopError> {
        let defs = bounded_listing(
            self.config.evaluation_timeout,
            self.repository.list_sensors(),
        )
        .await?;
        Ok(defs
            .into_iter()
            .filter(|d| d.kind() == TriggerKind::Sensor)
            .collect())
    }

    /// Poll `def` if it is due at `now`
    pub async fn evaluate(
        &self,
        def: &TriggerDefinition,
        now: DateTime<Utc>,
    ) -> Result<SensorReport, StorageError> {
        let mut report = SensorReport::default();
        let Some(minimum_interval) = def.minimum_interval() else {
            return Ok(report);
        };

        let mut state = load_state(self.store.as_ref(), def, now, || {
            TriggerState::sensor(def.id.clone(), self.config.recent_run_keys)
        })?;
        if !state.is_running() {
            return Ok(report);
        }
        if state.in_backoff(now) {
            report.next_due = state.backoff_until;
            return Ok(report);
        }
        if !is_due(&state, minimum_interval, now) {
            report.next_due = next_due(&state, minimum_interval);
            return Ok(report);
        }

        state.recent_run_keys.resize(self.config.recent_run_keys);
        let cursor = state.sensor_cursor().map(String::from);
        let result = bounded(
            self.config.evaluation_timeout,
            &def.id,
            self.repository.evaluate_sensor(&def.id, cursor.as_deref()),
        )
        .await;
        report.polled = true;

        let runs: Vec<QueuedRun> = match result {
            Ok(result) if result.skip_reason.is_some() => {
                tracing::debug!(
                    trigger = %def.id,
                    reason = ?result.skip_reason,
                    "sensor skipped"
                );
                state.record_poll(now, result.cursor);
                state.record_success();
                Vec::new()
            }
            Ok(result) => {
                let batch = sensor_requests(def, result.run_requests, &mut state.recent_run_keys);
                report.suppressed = batch.suppressed;
                state.record_poll(now, result.cursor);
                state.record_success();
                batch
                    .requests
                    .into_iter()
                    .map(|request| {
                        QueuedRun::new(self.id_gen.next_run_id(), request, Some(def.id.clone()), now)
                    })
                    .collect()
            }
            Err(e) => {
                // The poll still counts: a failing sensor waits out its
                // interval like a healthy one
                let until = backoff_until(&e, now, self.config.transport_backoff);
                state.record_poll(now, None);
                state.record_error(e.to_string(), until);
                report.errors.push(e.to_string());
                Vec::new()
            }
        };

        let outcome = commit(self.store.as_ref(), &mut state, runs)?;
        report.queued = outcome.queued;
        report.suppressed.extend(outcome.duplicates);

        report.next_due = match state.backoff_until.filter(|_| state.in_backoff(now)) {
            Some(until) => Some(until),
            None => next_due(&state, minimum_interval),
        };
        Ok(report)
    }
}

/// The sensor loop: polls every due sensor, then sleeps until the next one
/// is due (never longer than `sensor_interval`)
pub struct SensorLoop<R, I, C> {
    evaluator: SensorEvaluator<R, I>,
    clock: C,
    interval: Duration,
}

impl<R: Repository, I: IdGen, C: Clock> SensorLoop<R, I, C> {
    pub fn new(evaluator: SensorEvaluator<R, I>, clock: C, interval: Duration) -> Self {
        Self {
            evaluator,
            clock,
            interval,
        }
    }
}

#[async_trait]
impl<R: Repository, I: IdGen, C: Clock> DaemonLoop for SensorLoop<R, I, C> {
    fn kind(&self) -> DaemonKind {
        DaemonKind::Sensor
    }

    fn idle_interval(&self) -> Duration {
        self.interval
    }

    async fn run_iteration(&mut self) -> Result<Iteration, LoopError> {
        let defs = self.evaluator.definitions().await?;
        let mut iteration = Iteration::new(self.interval);

        for def in &defs {
            let now = self.clock.now();
            match self.evaluator.evaluate(def, now).await {
                Ok(report) => {
                    if !report.queued.is_empty() || !report.suppressed.is_empty() {
                        tracing::info!(
                            trigger = %def.id,
                            queued = report.queued.len(),
                            suppressed = report.suppressed.len(),
                            "sensor requested runs"
                        );
                    }
                    iteration.errors.extend(report.errors);
                    if let Some(due) = report.next_due {
                        iteration.wake_at(due, self.clock.now());
                    }
                }
                Err(e) => {
                    tracing::error!(trigger = %def.id, error = %e, "failed to record sensor poll");
                    iteration.errors.push(format!("{}: {}", def.id, e));
                }
            }
        }

        Ok(iteration)
    }
}

#[cfg(test)]
#[path = "sensors_tests.rs"]
mod tests;
