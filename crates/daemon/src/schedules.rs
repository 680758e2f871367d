// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule tick evaluator and the schedule loop
//!
//! For each running schedule the evaluator walks the cron ticks due since
//! the stored cursor (capped at `max_catchup_ticks`), calls the user
//! function once per tick and commits the tick's runs together with the
//! cursor advanced to that tick. A tick is therefore either fully recorded
//! or still due after a crash, and its run keys make a re-evaluation
//! harmless.

use crate::config::DaemonConfig;
use crate::daemon_loop::{DaemonLoop, Iteration, LoopError};
use crate::evaluation::{backoff_until, bounded, bounded_listing, commit, load_state};
use async_trait::async_trait;
use cadence_adapters::Repository;
use cadence_core::schedule::{plan_ticks, schedule_requests};
use cadence_core::{
    Clock, DaemonKind, IdGen, QueuedRun, RunId, TriggerDefinition, TriggerKind, TriggerState,
};
use cadence_storage::{Storage, StorageError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What one schedule evaluation did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleReport {
    /// Ticks handed to the user function
    pub evaluated_ticks: usize,
    /// Due ticks passed over by the catch-up cap
    pub skipped_ticks: usize,
    pub queued: Vec<RunId>,
    pub errors: Vec<String>,
    /// When the schedule next needs evaluating; `None` while stopped
    pub next_due: Option<DateTime<Utc>>,
}

/// Evaluates schedules against the repository and commits the results
pub struct ScheduleEvaluator<R, I> {
    repository: R,
    store: Arc<dyn Storage>,
    id_gen: I,
    config: Arc<DaemonConfig>,
}

impl<R: Repository, I: IdGen> ScheduleEvaluator<R, I> {
    pub fn new(repository: R, store: Arc<dyn Storage>, id_gen: I, config: Arc<DaemonConfig>) -> Self {
        Self {
            repository,
            store,
            id_gen,
            config,
        }
    }

    /// Current schedule definitions, reloaded on every call
    pub async fn definitions(&self) -> Result<Vec<TriggerDefinition>, LoopError> {
        let defs = bounded_listing(
            self.config.evaluation_timeout,
            self.repository.list_schedules(),
        )
        .await?;
        Ok(defs
            .into_iter()
            .filter(|d| d.kind() == TriggerKind::Schedule)
            .collect())
    }

    /// Evaluate every tick of `def` due at `now`
    pub async fn evaluate(
        &self,
        def: &TriggerDefinition,
        now: DateTime<Utc>,
    ) -> Result<ScheduleReport, StorageError> {
        let mut report = ScheduleReport::default();
        let Some(cron) = def.cron() else {
            return Ok(report);
        };

        let mut state = load_state(self.store.as_ref(), def, now, || {
            TriggerState::schedule(def.id.clone(), now)
        })?;
        if !state.is_running() {
            return Ok(report);
        }
        if state.in_backoff(now) {
            report.next_due = state.backoff_until;
            return Ok(report);
        }
        let Some(last_evaluated) = state.last_evaluated() else {
            tracing::warn!(trigger = %def.id, "stored state is not a schedule cursor");
            return Ok(report);
        };

        let plan = plan_ticks(cron, last_evaluated, now, self.config.max_catchup_ticks);
        if plan.skipped > 0 {
            tracing::warn!(
                trigger = %def.id,
                skipped = plan.skipped,
                evaluating = plan.ticks.len(),
                "catch-up limit reached, skipping older ticks"
            );
        }
        report.skipped_ticks = plan.skipped;

        for tick in plan.ticks {
            let result = bounded(
                self.config.evaluation_timeout,
                &def.id,
                self.repository.evaluate_schedule(&def.id, tick),
            )
            .await;

            let runs = match result {
                Ok(result) => {
                    if let Some(reason) = &result.skip_reason {
                        tracing::debug!(trigger = %def.id, %tick, reason = %reason, "tick skipped by schedule");
                    }
                    state.record_success();
                    schedule_requests(def, tick, result)
                        .into_iter()
                        .map(|request| {
                            QueuedRun::new(
                                self.id_gen.next_run_id(),
                                request,
                                Some(def.id.clone()),
                                now,
                            )
                        })
                        .collect()
                }
                Err(e) => {
                    // The cursor still moves past the tick: a broken schedule
                    // must not pin the evaluator to it
                    let until = backoff_until(&e, now, self.config.transport_backoff);
                    state.record_error(e.to_string(), until);
                    report.errors.push(e.to_string());
                    Vec::new()
                }
            };

            state.advance_schedule(tick);
            let outcome = commit(self.store.as_ref(), &mut state, runs)?;
            report.evaluated_ticks += 1;
            report.queued.extend(outcome.queued);

            if state.in_backoff(now) {
                break;
            }
        }

        report.next_due = match state.backoff_until.filter(|_| state.in_backoff(now)) {
            Some(until) => Some(until),
            None => state.last_evaluated().and_then(|t| cron.next_after(t)),
        };
        Ok(report)
    }
}

/// The schedule loop: evaluates every schedule, then sleeps until the next
/// tick (never longer than `schedule_interval`)
pub struct ScheduleLoop<R, I, C> {
    evaluator: ScheduleEvaluator<R, I>,
    clock: C,
    interval: Duration,
}

impl<R: Repository, I: IdGen, C: Clock> ScheduleLoop<R, I, C> {
    pub fn new(evaluator: ScheduleEvaluator<R, I>, clock: C, interval: Duration) -> Self {
        Self {
            evaluator,
            clock,
            interval,
        }
    }
}

#[async_trait]
impl<R: Repository, I: IdGen, C: Clock> DaemonLoop for ScheduleLoop<R, I, C> {
    fn kind(&self) -> DaemonKind {
        DaemonKind::Scheduler
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
                    if !report.queued.is_empty() {
                        tracing::info!(
                            trigger = %def.id,
                            queued = report.queued.len(),
                            "schedule queued runs"
                        );
                    }
                    iteration.errors.extend(report.errors);
                    if let Some(due) = report.next_due {
                        iteration.wake_at(due, self.clock.now());
                    }
                }
                Err(e) => {
                    tracing::error!(trigger = %def.id, error = %e, "failed to record schedule evaluation");
                    iteration.errors.push(format!("{}: {}", def.id, e));
                }
            }
        }

        Ok(iteration)
    }
}

#[cfg(test)]
#[path = "schedules_tests.rs"]
mod tests;
