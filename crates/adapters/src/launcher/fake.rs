// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake run launcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LaunchError, RunLauncher};
use async_trait::async_trait;
use cadence_core::{QueuedRun, RunId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Recorded launcher call
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchCall {
    Launch { run_id: RunId, job: Option<String> },
    Shutdown { wait: bool },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<LaunchCall>,
    /// Job name -> launch error message
    failing_jobs: HashMap<String, String>,
    /// Launched runs stay active until `finish` when set
    hold_runs: bool,
    active: BTreeSet<RunId>,
}

/// Fake launcher that records launches and can simulate failures
#[derive(Clone, Default)]
pub struct FakeRunLauncher {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeRunLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject every launch of `job`
    pub fn fail_job(&self, job: &str, message: &str) {
        self.state()
            .failing_jobs
            .insert(job.to_string(), message.to_string());
    }

    /// Keep launched runs active until [`FakeRunLauncher::finish`]
    pub fn hold_runs(&self) {
        self.state().hold_runs = true;
    }

    pub fn finish(&self, run_id: &RunId) {
        self.state().active.remove(run_id);
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.state().calls.clone()
    }

    /// Ids of every run passed to `launch`, in order
    pub fn launched(&self) -> Vec<RunId> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                LaunchCall::Launch { run_id, .. } => Some(run_id.clone()),
                LaunchCall::Shutdown { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl RunLauncher for FakeRunLauncher {
    async fn launch(&self, run: &QueuedRun) -> Result<(), LaunchError> {
        let mut state = self.state();
        let job = run.request.job_name.clone();
        state.calls.push(LaunchCall::Launch {
            run_id: run.id.clone(),
            job: job.clone(),
        });

        if let Some(message) = job.as_ref().and_then(|j| state.failing_jobs.get(j)) {
            return Err(LaunchError::Rejected {
                run: run.id.clone(),
                message: message.clone(),
            });
        }
        if state.hold_runs {
            state.active.insert(run.id.clone());
        }
        Ok(())
    }

    async fn active_runs(&self) -> Vec<RunId> {
        self.state().active.iter().cloned().collect()
    }

    async fn shutdown(&self, wait: bool) {
        let mut state = self.state();
        state.calls.push(LaunchCall::Shutdown { wait });
        state.active.clear();
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
