// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon supervisor: owns the three loops and answers health checks
//!
//! `start` spawns the schedule, sensor and run-queue loops as independent
//! tokio tasks sharing one [`HeartbeatBoard`]. `stop` flips the shared
//! cancel flag, waits for each loop to finish its current iteration and
//! then shuts down the launcher.

use crate::config::DaemonConfig;
use crate::coordinator::{Coordinator, RunQueueLoop};
use crate::daemon_loop::run_loop;
use crate::heartbeat::HeartbeatBoard;
use crate::schedules::{ScheduleEvaluator, ScheduleLoop};
use crate::sensors::{SensorEvaluator, SensorLoop};
use cadence_adapters::{Repository, RunLauncher};
use cadence_core::{Clock, DaemonKind, Heartbeat, IdGen, QueuedRun, RunRequest, TriggerId};
use cadence_storage::{Storage, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Adapters the supervisor runs against
pub struct DaemonDeps<R, L, C, I> {
    pub repository: R,
    pub launcher: L,
    pub store: Arc<dyn Storage>,
    pub clock: C,
    pub id_gen: I,
}

fn names(kinds: &[DaemonKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failed health check
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HealthError {
    #[error("daemon loops are not running")]
    NotStarted,
    #[error("daemon loops have died: {}", names(.0))]
    DeadLoops(Vec<DaemonKind>),
    #[error("daemon heartbeats are stale: {}", names(.0))]
    StaleHeartbeats(Vec<DaemonKind>),
}

struct RunningLoops {
    board: HeartbeatBoard,
    cancel: watch::Sender<bool>,
    handles: Vec<(DaemonKind, JoinHandle<()>)>,
}

pub struct Supervisor<R, L, C, I> {
    repository: R,
    launcher: L,
    store: Arc<dyn Storage>,
    clock: C,
    id_gen: I,
    config: Arc<DaemonConfig>,
    coordinator: Coordinator<L, C, I>,
    running: Option<RunningLoops>,
}

impl<R, L, C, I> Supervisor<R, L, C, I>
where
    R: Repository,
    L: RunLauncher,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: DaemonDeps<R, L, C, I>, config: Arc<DaemonConfig>) -> Self {
        let coordinator = Coordinator::new(
            Arc::clone(&deps.store),
            deps.launcher.clone(),
            deps.clock.clone(),
            deps.id_gen.clone(),
            Arc::clone(&config),
        );
        Self {
            repository: deps.repository,
            launcher: deps.launcher,
            store: deps.store,
            clock: deps.clock,
            id_gen: deps.id_gen,
            config,
            coordinator,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the daemon loops. Must be called within a tokio runtime.
    ///
    /// Runs a previous daemon left half-launched are failed first. Calling
    /// `start` on a running supervisor does nothing.
    pub fn start(&mut self) -> Result<(), StorageError> {
        if self.running.is_some() {
            return Ok(());
        }
        let recovered = self.coordinator.recover_interrupted()?;
        if recovered > 0 {
            tracing::warn!(count = recovered, "failed runs interrupted by restart");
        }

        let board = HeartbeatBoard::new(self.clock.now());
        let (cancel, cancel_rx) = watch::channel(false);

        let schedules = ScheduleLoop::new(
            ScheduleEvaluator::new(
                self.repository.clone(),
                Arc::clone(&self.store),
                self.id_gen.clone(),
                Arc::clone(&self.config),
            ),
            self.clock.clone(),
            self.config.schedule_interval,
        );
        let sensors = SensorLoop::new(
            SensorEvaluator::new(
                self.repository.clone(),
                Arc::clone(&self.store),
                self.id_gen.clone(),
                Arc::clone(&self.config),
            ),
            self.clock.clone(),
            self.config.sensor_interval,
        );
        let run_queue = RunQueueLoop::new(self.coordinator.clone(), self.config.queue_interval);

        let handles = vec![
            (
                DaemonKind::Scheduler,
                tokio::spawn(run_loop(
                    schedules,
                    self.clock.clone(),
                    board.clone(),
                    cancel_rx.clone(),
                )),
            ),
            (
                DaemonKind::Sensor,
                tokio::spawn(run_loop(
                    sensors,
                    self.clock.clone(),
                    board.clone(),
                    cancel_rx.clone(),
                )),
            ),
            (
                DaemonKind::RunQueue,
                tokio::spawn(run_loop(
                    run_queue,
                    self.clock.clone(),
                    board.clone(),
                    cancel_rx,
                )),
            ),
        ];

        tracing::info!("daemon loops started");
        self.running = Some(RunningLoops {
            board,
            cancel,
            handles,
        });
        Ok(())
    }

    /// Stop every loop after its current iteration, then wait for launched
    /// processes to exit (or terminate them when `wait_for_subprocesses` is
    /// false)
    pub async fn stop(&mut self, wait_for_subprocesses: bool) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.send_replace(true);

        for (kind, handle) in running.handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(daemon = %kind, "loop panicked before shutdown");
                }
            }
        }

        self.launcher.shutdown(wait_for_subprocesses).await;
        tracing::info!(wait_for_subprocesses, "daemon loops stopped");
    }

    /// Fails if any loop's task has ended without being asked to stop
    pub fn check_threads(&self) -> Result<(), HealthError> {
        let running = self.running.as_ref().ok_or(HealthError::NotStarted)?;
        let dead: Vec<DaemonKind> = running
            .handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(kind, _)| *kind)
            .collect();
        if dead.is_empty() {
            Ok(())
        } else {
            Err(HealthError::DeadLoops(dead))
        }
    }

    /// Fails if any loop has not completed an iteration within `max_age`
    pub fn check_heartbeats(&self, max_age: Duration) -> Result<(), HealthError> {
        let running = self.running.as_ref().ok_or(HealthError::NotStarted)?;
        let stale = running.board.stale(self.clock.now(), max_age);
        if stale.is_empty() {
            Ok(())
        } else {
            Err(HealthError::StaleHeartbeats(stale))
        }
    }

    /// Latest heartbeat of every loop; empty when stopped
    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.running
            .as_ref()
            .map(|r| r.board.all())
            .unwrap_or_default()
    }

    /// Time since `start`
    pub fn uptime(&self) -> Duration {
        self.running
            .as_ref()
            .and_then(|r| (self.clock.now() - r.board.started_at()).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    pub fn submit(
        &self,
        request: RunRequest,
        origin: Option<TriggerId>,
    ) -> Result<Option<QueuedRun>, StorageError> {
        self.coordinator.submit(request, origin)
    }

    pub fn queued_runs(&self) -> Result<usize, StorageError> {
        self.coordinator.queued_runs()
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
