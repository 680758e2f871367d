// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::launcher::{LaunchError, RunLauncher};
use crate::repository::{Repository, RepositoryError};
use async_trait::async_trait;
use cadence_core::{EvaluationResult, QueuedRun, RunId, TriggerDefinition, TriggerId};
use chrono::{DateTime, Utc};
use tracing::Instrument;

fn log_evaluation(result: &Result<EvaluationResult, RepositoryError>, elapsed: std::time::Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match result {
        Ok(r) => tracing::info!(
            requests = r.run_requests.len(),
            skipped = r.skip_reason.is_some(),
            elapsed_ms,
            "evaluated"
        ),
        Err(e) if e.is_transport() => {
            tracing::warn!(elapsed_ms, error = %e, "repository unavailable")
        }
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "evaluation failed"),
    }
}

/// Wrapper that adds tracing to any Repository
#[derive(Clone)]
pub struct TracedRepository<R> {
    inner: R,
}

impl<R> TracedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Repository> Repository for TracedRepository<R> {
    async fn list_schedules(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        let result = self.inner.list_schedules().await;
        match &result {
            Ok(defs) => tracing::trace!(count = defs.len(), "listed schedules"),
            Err(e) => tracing::error!(error = %e, "listing schedules failed"),
        }
        result
    }

    async fn list_sensors(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        let result = self.inner.list_sensors().await;
        match &result {
            Ok(defs) => tracing::trace!(count = defs.len(), "listed sensors"),
            Err(e) => tracing::error!(error = %e, "listing sensors failed"),
        }
        result
    }

    async fn evaluate_schedule(
        &self,
        id: &TriggerId,
        tick: DateTime<Utc>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let span = tracing::info_span!("schedule.evaluate", trigger = %id, %tick);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.evaluate_schedule(id, tick).await;
            log_evaluation(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn evaluate_sensor(
        &self,
        id: &TriggerId,
        cursor: Option<&str>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let span = tracing::info_span!("sensor.evaluate", trigger = %id, cursor);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.evaluate_sensor(id, cursor).await;
            log_evaluation(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any RunLauncher
#[derive(Clone)]
pub struct TracedRunLauncher<L> {
    inner: L,
}

impl<L> TracedRunLauncher<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: RunLauncher> RunLauncher for TracedRunLauncher<L> {
    async fn launch(&self, run: &QueuedRun) -> Result<(), LaunchError> {
        let span = tracing::info_span!(
            "run.launch",
            run_id = %run.id,
            job = run.request.job_name.as_deref().unwrap_or("-"),
        );
        async {
            let start = std::time::Instant::now();
            let result = self.inner.launch(run).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "run started"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "run failed to start"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn active_runs(&self) -> Vec<RunId> {
        let active = self.inner.active_runs().await;
        tracing::trace!(count = active.len(), "active runs");
        active
    }

    async fn shutdown(&self, wait: bool) {
        tracing::info!(wait, "shutting down launcher");
        self.inner.shutdown(wait).await;
        tracing::info!("launcher shut down");
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
