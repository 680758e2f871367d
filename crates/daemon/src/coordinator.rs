// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run queue coordinator and the run-queue loop
//!
//! Queued runs are launched oldest first. Every launch moves the run
//! `Queued -> Starting` before the launcher is called and `Starting ->
//! Started | FailedToStart` after, each step a compare-and-set on the prior
//! status. Launch failures are terminal and never retried.

use crate::config::{DaemonConfig, TagLimit};
use crate::daemon_loop::{DaemonLoop, Iteration, LoopError};
use async_trait::async_trait;
use cadence_adapters::RunLauncher;
use cadence_core::{
    Clock, DaemonKind, IdGen, QueuedRun, RunEvent, RunId, RunRequest, RunStatus, TriggerId,
};
use cadence_storage::{Storage, StorageError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const RESTART_ERROR: &str = "daemon restarted while run was starting";

/// What one pass over the queue did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DequeueReport {
    pub launched: Vec<RunId>,
    pub failed: Vec<RunId>,
    /// Queued runs held back by a concurrency limit
    pub deferred: usize,
    /// Terminal runs dropped from history
    pub pruned: usize,
    /// Runs starting or executing before this pass launched anything
    pub in_flight: usize,
}

/// Tags of every run currently counted against concurrency limits
struct InFlight {
    tags: Vec<BTreeMap<String, String>>,
}

impl InFlight {
    fn matching(&self, limit: &TagLimit) -> usize {
        self.tags
            .iter()
            .filter(|tags| tags.get(&limit.key) == Some(&limit.value))
            .count()
    }

    /// The first tag limit `run` would exceed
    fn blocking_limit<'a>(&self, run: &QueuedRun, limits: &'a [TagLimit]) -> Option<&'a TagLimit> {
        limits.iter().find(|limit| {
            run.request.tags.get(&limit.key) == Some(&limit.value)
                && self.matching(limit) >= limit.limit
        })
    }
}

/// Accepts run requests and hands queued runs to the launcher
#[derive(Clone)]
pub struct Coordinator<L, C, I> {
    store: Arc<dyn Storage>,
    launcher: L,
    clock: C,
    id_gen: I,
    config: Arc<DaemonConfig>,
}

impl<L: RunLauncher, C: Clock, I: IdGen> Coordinator<L, C, I> {
    pub fn new(
        store: Arc<dyn Storage>,
        launcher: L,
        clock: C,
        id_gen: I,
        config: Arc<DaemonConfig>,
    ) -> Self {
        Self {
            store,
            launcher,
            clock,
            id_gen,
            config,
        }
    }

    /// Queue a run request made outside trigger evaluation.
    ///
    /// Returns `None` when a run with the same run key already exists.
    pub fn submit(
        &self,
        request: RunRequest,
        origin: Option<TriggerId>,
    ) -> Result<Option<QueuedRun>, StorageError> {
        let run = QueuedRun::new(self.id_gen.next_run_id(), request, origin, self.clock.now());
        if !self.store.add_run(run.clone())? {
            tracing::debug!(run_key = ?run.run_key(), "run key already queued");
            return Ok(None);
        }
        tracing::info!(run_id = %run.id, job = ?run.request.job_name, "run queued");
        Ok(Some(run))
    }

    pub fn queued_runs(&self) -> Result<usize, StorageError> {
        Ok(self.store.runs_with_status(RunStatus::Queued)?.len())
    }

    /// Fail runs a previous daemon left in `Starting`. Whether their launch
    /// went through is unknown, and relaunching could start them twice.
    pub fn recover_interrupted(&self) -> Result<usize, StorageError> {
        let interrupted = self.store.runs_with_status(RunStatus::Starting)?;
        let now = self.clock.now();
        for run in &interrupted {
            tracing::warn!(run_id = %run.id, "marking interrupted run as failed to start");
            let failed = run.transition(
                RunEvent::LaunchFailed {
                    error: RESTART_ERROR.to_string(),
                },
                now,
            );
            self.store.update_run(RunStatus::Starting, failed)?;
        }
        Ok(interrupted.len())
    }

    async fn in_flight(&self) -> Result<InFlight, StorageError> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for run in self.store.runs_with_status(RunStatus::Starting)? {
            seen.insert(run.id.clone());
            tags.push(run.request.tags);
        }
        for id in self.launcher.active_runs().await {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.store.run(&id)? {
                Some(run) => tags.push(run.request.tags),
                // Pruned from history but still executing
                None => tags.push(BTreeMap::new()),
            }
        }
        Ok(InFlight { tags })
    }

    /// Launch queued runs, oldest first, within the concurrency limits
    pub async fn dequeue(&self) -> Result<DequeueReport, StorageError> {
        let mut report = DequeueReport {
            pruned: self.store.prune_runs(self.config.run_history_limit)?,
            ..DequeueReport::default()
        };

        // Asked on every pass so the launcher reaps finished runs even while
        // nothing is queued
        let mut in_flight = self.in_flight().await?;
        report.in_flight = in_flight.tags.len();

        let queued = self.store.runs_with_status(RunStatus::Queued)?;
        if queued.is_empty() {
            return Ok(report);
        }
        let limits = &self.config.tag_concurrency_limits;

        for (index, run) in queued.iter().enumerate() {
            if let Some(max) = self.config.max_concurrent_runs {
                if in_flight.tags.len() >= max {
                    report.deferred += queued.len() - index;
                    break;
                }
            }
            if let Some(limit) = in_flight.blocking_limit(run, limits) {
                tracing::debug!(
                    run_id = %run.id,
                    tag = %limit.key,
                    value = %limit.value,
                    "run held back by tag limit"
                );
                report.deferred += 1;
                continue;
            }

            let starting = run.transition(RunEvent::Dequeue, self.clock.now());
            match self.store.update_run(RunStatus::Queued, starting.clone()) {
                Ok(()) => {}
                Err(StorageError::StatusConflict { .. }) => continue,
                Err(e) => return Err(e),
            }

            match self.launcher.launch(&starting).await {
                Ok(()) => {
                    let started = starting.transition(RunEvent::Launched, self.clock.now());
                    self.store.update_run(RunStatus::Starting, started)?;
                    in_flight.tags.push(starting.request.tags);
                    report.launched.push(starting.id);
                }
                Err(e) => {
                    tracing::warn!(run_id = %starting.id, error = %e, "run failed to start");
                    let failed = starting.transition(
                        RunEvent::LaunchFailed {
                            error: e.to_string(),
                        },
                        self.clock.now(),
                    );
                    self.store.update_run(RunStatus::Starting, failed)?;
                    report.failed.push(starting.id);
                }
            }
        }

        Ok(report)
    }
}

/// The run-queue loop: one dequeue pass per `queue_interval`
pub struct RunQueueLoop<L, C, I> {
    coordinator: Coordinator<L, C, I>,
    interval: Duration,
}

impl<L: RunLauncher, C: Clock, I: IdGen> RunQueueLoop<L, C, I> {
    pub fn new(coordinator: Coordinator<L, C, I>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }
}

#[async_trait]
impl<L: RunLauncher, C: Clock, I: IdGen> DaemonLoop for RunQueueLoop<L, C, I> {
    fn kind(&self) -> DaemonKind {
        DaemonKind::RunQueue
    }

    fn idle_interval(&self) -> Duration {
        self.interval
    }

    async fn run_iteration(&mut self) -> Result<Iteration, LoopError> {
        let report = self.coordinator.dequeue().await?;
        if !report.launched.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                launched = report.launched.len(),
                failed = report.failed.len(),
                deferred = report.deferred,
                "dequeued runs"
            );
        }
        if report.pruned > 0 {
            tracing::debug!(pruned = report.pruned, "pruned run history");
        }
        Ok(Iteration::new(self.interval))
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
