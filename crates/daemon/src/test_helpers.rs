// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon unit tests

use crate::config::DaemonConfig;
use cadence_core::{
    CronSchedule, QueuedRun, RunId, RunStatus, TriggerDefinition, TriggerId, TriggerState,
};
use cadence_storage::{CommitOutcome, Storage, StorageError, Store};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const REPO: &str = "repo";

/// 2026-01-01T00:00:30Z, half a minute clear of any minute tick
pub(crate) fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 30).unwrap()
}

pub(crate) fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, h, m, s).unwrap()
}

pub(crate) fn schedule(name: &str, cron: &str) -> TriggerDefinition {
    TriggerDefinition::schedule(
        TriggerId::new(REPO, name),
        format!("{}_job", name),
        CronSchedule::parse(cron).unwrap(),
    )
}

pub(crate) fn sensor(name: &str, interval_secs: u64) -> TriggerDefinition {
    TriggerDefinition::sensor(
        TriggerId::new(REPO, name),
        format!("{}_job", name),
        Duration::from_secs(interval_secs),
    )
}

pub(crate) fn config() -> Arc<DaemonConfig> {
    Arc::new(DaemonConfig::default())
}

pub(crate) fn run_keys(store: &dyn Storage, status: RunStatus) -> Vec<String> {
    store
        .runs_with_status(status)
        .unwrap()
        .iter()
        .filter_map(|r| r.run_key().map(String::from))
        .collect()
}

/// Store that loses the next evaluation commit, like a crash right
/// before the write reached disk
pub(crate) struct CrashingStore {
    inner: Store,
    crash_next_commit: AtomicBool,
}

impl CrashingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Store::in_memory(),
            crash_next_commit: AtomicBool::new(false),
        }
    }

    pub(crate) fn crash_next_commit(&self) {
        self.crash_next_commit.store(true, Ordering::SeqCst);
    }
}

impl Storage for CrashingStore {
    fn trigger_state(&self, id: &TriggerId) -> Result<Option<TriggerState>, StorageError> {
        self.inner.trigger_state(id)
    }

    fn trigger_states(&self) -> Result<Vec<TriggerState>, StorageError> {
        self.inner.trigger_states()
    }

    fn put_trigger_state(&self, state: TriggerState) -> Result<(), StorageError> {
        self.inner.put_trigger_state(state)
    }

    fn commit_evaluation(
        &self,
        expected_version: u64,
        state: TriggerState,
        runs: Vec<QueuedRun>,
    ) -> Result<CommitOutcome, StorageError> {
        if self.crash_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Wal(cadence_storage::WalError::Io(
                std::io::Error::other("simulated crash"),
            )));
        }
        self.inner.commit_evaluation(expected_version, state, runs)
    }

    fn add_run(&self, run: QueuedRun) -> Result<bool, StorageError> {
        self.inner.add_run(run)
    }

    fn run(&self, id: &RunId) -> Result<Option<QueuedRun>, StorageError> {
        self.inner.run(id)
    }

    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<QueuedRun>, StorageError> {
        self.inner.runs_with_status(status)
    }

    fn update_run(&self, expected: RunStatus, run: QueuedRun) -> Result<(), StorageError> {
        self.inner.update_run(expected, run)
    }

    fn has_run_key(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.has_run_key(key)
    }

    fn prune_runs(&self, keep: usize) -> Result<usize, StorageError> {
        self.inner.prune_runs(keep)
    }
}
