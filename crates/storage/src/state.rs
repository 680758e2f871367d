// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use crate::Operation;
use cadence_core::{QueuedRun, RunId, RunStatus, TriggerId, TriggerState};
use std::collections::{BTreeMap, HashMap};

/// Materialized state built from WAL operations
#[derive(Debug, Default)]
pub struct MaterializedState {
    pub triggers: HashMap<TriggerId, TriggerState>,
    /// Runs in insertion (FIFO) order
    runs: BTreeMap<u64, QueuedRun>,
    positions: HashMap<RunId, u64>,
    run_keys: HashMap<String, RunId>,
    next_position: u64,
}

impl MaterializedState {
    pub fn run(&self, id: &RunId) -> Option<&QueuedRun> {
        self.positions.get(id).and_then(|pos| self.runs.get(pos))
    }

    /// All runs, oldest first
    pub fn runs(&self) -> impl Iterator<Item = &QueuedRun> {
        self.runs.values()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn has_run_key(&self, key: &str) -> bool {
        self.run_keys.contains_key(key)
    }

    pub fn runs_with_status(&self, status: RunStatus) -> impl Iterator<Item = &QueuedRun> {
        self.runs.values().filter(move |r| r.status == status)
    }

    /// Oldest terminal runs beyond the newest `keep` terminal runs
    pub fn prunable_runs(&self, keep: usize) -> Vec<RunId> {
        let terminal: Vec<&QueuedRun> = self.runs.values().filter(|r| r.is_terminal()).collect();
        let excess = terminal.len().saturating_sub(keep);
        terminal
            .into_iter()
            .take(excess)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::TriggerStatePut { state } => {
                self.triggers.insert(state.id.clone(), state.clone());
            }

            Operation::EvaluationCommit { state, runs } => {
                for run in runs {
                    self.insert_run(run.clone());
                }
                self.triggers.insert(state.id.clone(), state.clone());
            }

            Operation::RunAdd { run } => {
                self.insert_run(run.clone());
            }

            Operation::RunUpdate { run } => {
                if let Some(pos) = self.positions.get(&run.id) {
                    self.runs.insert(*pos, run.clone());
                }
            }

            Operation::RunsPrune { ids } => {
                for id in ids {
                    self.remove_run(id);
                }
            }

            Operation::Snapshot { triggers, runs } => {
                *self = MaterializedState::default();
                for state in triggers {
                    self.triggers.insert(state.id.clone(), state.clone());
                }
                for run in runs {
                    self.insert_run(run.clone());
                }
            }
        }
    }

    /// Operation that recreates this state from scratch
    pub fn snapshot(&self) -> Operation {
        let mut triggers: Vec<TriggerState> = self.triggers.values().cloned().collect();
        triggers.sort_by(|a, b| a.id.cmp(&b.id));
        Operation::Snapshot {
            triggers,
            runs: self.runs.values().cloned().collect(),
        }
    }

    fn insert_run(&mut self, run: QueuedRun) {
        if self.positions.contains_key(&run.id) {
            return;
        }
        if let Some(key) = run.run_key() {
            if self.run_keys.contains_key(key) {
                return;
            }
            self.run_keys.insert(key.to_string(), run.id.clone());
        }
        let pos = self.next_position;
        self.next_position += 1;
        self.positions.insert(run.id.clone(), pos);
        self.runs.insert(pos, run);
    }

    fn remove_run(&mut self, id: &RunId) {
        let Some(pos) = self.positions.remove(id) else {
            return;
        };
        if let Some(run) = self.runs.remove(&pos) {
            if let Some(key) = run.run_key() {
                self.run_keys.remove(key);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
