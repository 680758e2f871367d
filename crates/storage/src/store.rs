// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store: materialized state behind a write-ahead log
//!
//! Every mutation is appended to the log before it is applied in memory,
//! so a crash never leaves memory ahead of disk. An evaluation's new runs
//! and its advanced trigger state are one log entry: either both survive a
//! crash or neither does.

use crate::{MaterializedState, Operation, Wal, WalError};
use cadence_core::{QueuedRun, RunId, RunStatus, TriggerId, TriggerState};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Log entries after which the WAL is rewritten as a snapshot
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 10_000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("trigger {trigger} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        trigger: TriggerId,
        expected: u64,
        found: u64,
    },

    #[error("run not found: {0}")]
    RunNotFound(RunId),

    #[error("run {run} is {found}, expected {expected}")]
    StatusConflict {
        run: RunId,
        expected: RunStatus,
        found: RunStatus,
    },
}

/// Result of committing an evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Runs newly queued
    pub queued: Vec<RunId>,
    /// Run keys that were already present and so not queued again
    pub duplicates: Vec<String>,
}

/// Durable trigger state and run storage
pub trait Storage: Send + Sync {
    fn trigger_state(&self, id: &TriggerId) -> Result<Option<TriggerState>, StorageError>;

    fn trigger_states(&self) -> Result<Vec<TriggerState>, StorageError>;

    /// Unconditionally replace a trigger's state
    fn put_trigger_state(&self, state: TriggerState) -> Result<(), StorageError>;

    /// Atomically queue `runs` and write `state`.
    ///
    /// Fails with `Conflict` unless the stored version equals
    /// `expected_version` (0 when no state is stored). The written state gets
    /// version `expected_version + 1`. Runs whose key is already stored are
    /// skipped and reported as duplicates.
    fn commit_evaluation(
        &self,
        expected_version: u64,
        state: TriggerState,
        runs: Vec<QueuedRun>,
    ) -> Result<CommitOutcome, StorageError>;

    /// Queue a run outside an evaluation. Returns false for a duplicate key.
    fn add_run(&self, run: QueuedRun) -> Result<bool, StorageError>;

    fn run(&self, id: &RunId) -> Result<Option<QueuedRun>, StorageError>;

    /// Runs with `status`, oldest first
    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<QueuedRun>, StorageError>;

    /// Compare-and-set a run on its previous status
    fn update_run(&self, expected: RunStatus, run: QueuedRun) -> Result<(), StorageError>;

    fn has_run_key(&self, key: &str) -> Result<bool, StorageError>;

    /// Drop the oldest terminal runs beyond the newest `keep`. Returns the count.
    fn prune_runs(&self, keep: usize) -> Result<usize, StorageError>;
}

struct Inner {
    state: MaterializedState,
    wal: Option<Wal>,
    compact_threshold: u64,
}

impl Inner {
    fn record(&mut self, op: Operation) -> Result<(), StorageError> {
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&op)?;
        }
        self.state.apply(&op);
        self.maybe_compact()
    }

    fn maybe_compact(&mut self) -> Result<(), StorageError> {
        let Some(wal) = self.wal.as_mut() else {
            return Ok(());
        };
        if wal.len() < self.compact_threshold {
            return Ok(());
        }
        let before = wal.len();
        wal.rewrite(&[self.state.snapshot()])?;
        tracing::info!(entries = before, "compacted WAL into snapshot");
        Ok(())
    }
}

/// WAL-backed store (or purely in-memory when opened without a path)
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    /// Open a store, replaying any existing log at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_threshold(path, DEFAULT_COMPACT_THRESHOLD)
    }

    pub fn open_with_threshold(path: &Path, compact_threshold: u64) -> Result<Self, StorageError> {
        let mut state = MaterializedState::default();
        for op in Wal::replay(path)? {
            state.apply(&op);
        }
        let wal = Wal::open(path)?;

        tracing::info!(
            triggers = state.triggers.len(),
            runs = state.run_count(),
            "loaded state from WAL"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal: Some(wal),
                compact_threshold: compact_threshold.max(1),
            }),
        })
    }

    /// Non-durable store for tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MaterializedState::default(),
                wal: None,
                compact_threshold: u64::MAX,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of runs held in memory
    pub fn run_count(&self) -> usize {
        self.lock().state.run_count()
    }
}

impl Storage for Store {
    fn trigger_state(&self, id: &TriggerId) -> Result<Option<TriggerState>, StorageError> {
        Ok(self.lock().state.triggers.get(id).cloned())
    }

    fn trigger_states(&self) -> Result<Vec<TriggerState>, StorageError> {
        let mut states: Vec<_> = self.lock().state.triggers.values().cloned().collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    fn put_trigger_state(&self, state: TriggerState) -> Result<(), StorageError> {
        self.lock().record(Operation::TriggerStatePut { state })
    }

    fn commit_evaluation(
        &self,
        expected_version: u64,
        mut state: TriggerState,
        runs: Vec<QueuedRun>,
    ) -> Result<CommitOutcome, StorageError> {
        let mut inner = self.lock();

        let found = inner
            .state
            .triggers
            .get(&state.id)
            .map_or(0, |s| s.version);
        if found != expected_version {
            return Err(StorageError::Conflict {
                trigger: state.id.clone(),
                expected: expected_version,
                found,
            });
        }
        state.version = expected_version + 1;

        let mut outcome = CommitOutcome::default();
        let mut accepted = Vec::with_capacity(runs.len());
        let mut batch_keys = std::collections::HashSet::new();
        for run in runs {
            if let Some(key) = run.run_key() {
                if inner.state.has_run_key(key) || !batch_keys.insert(key.to_string()) {
                    outcome.duplicates.push(key.to_string());
                    continue;
                }
            }
            outcome.queued.push(run.id.clone());
            accepted.push(run);
        }

        inner.record(Operation::EvaluationCommit {
            state,
            runs: accepted,
        })?;
        Ok(outcome)
    }

    fn add_run(&self, run: QueuedRun) -> Result<bool, StorageError> {
        let mut inner = self.lock();
        if run.run_key().is_some_and(|key| inner.state.has_run_key(key)) {
            return Ok(false);
        }
        inner.record(Operation::RunAdd { run })?;
        Ok(true)
    }

    fn run(&self, id: &RunId) -> Result<Option<QueuedRun>, StorageError> {
        Ok(self.lock().state.run(id).cloned())
    }

    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<QueuedRun>, StorageError> {
        Ok(self
            .lock()
            .state
            .runs_with_status(status)
            .cloned()
            .collect())
    }

    fn update_run(&self, expected: RunStatus, run: QueuedRun) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let found = inner
            .state
            .run(&run.id)
            .map(|r| r.status)
            .ok_or_else(|| StorageError::RunNotFound(run.id.clone()))?;
        if found != expected {
            return Err(StorageError::StatusConflict {
                run: run.id.clone(),
                expected,
                found,
            });
        }
        inner.record(Operation::RunUpdate { run })
    }

    fn has_run_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock().state.has_run_key(key))
    }

    fn prune_runs(&self, keep: usize) -> Result<usize, StorageError> {
        let mut inner = self.lock();
        let ids = inner.state.prunable_runs(keep);
        if ids.is_empty() {
            return Ok(0);
        }
        let count = ids.len();
        inner.record(Operation::RunsPrune { ids })?;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
