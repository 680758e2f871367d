// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pieces shared by the schedule and sensor evaluators

use cadence_adapters::RepositoryError;
use cadence_core::{TriggerDefinition, TriggerId, TriggerState};
use cadence_storage::{CommitOutcome, Storage, StorageError};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Bound a call into user code by `timeout`
pub(crate) async fn bounded<T>(
    timeout: Duration,
    id: &TriggerId,
    call: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, RepositoryError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout {
            trigger: id.clone(),
            after: timeout,
        }),
    }
}

/// Bound a definition listing call by `timeout`
pub(crate) async fn bounded_listing<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, RepositoryError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Transport {
            repository: "*".to_string(),
            message: format!("listing triggers timed out after {:?}", timeout),
        }),
    }
}

/// When a trigger that just failed with `error` may be evaluated again
pub(crate) fn backoff_until(
    error: &RepositoryError,
    now: DateTime<Utc>,
    backoff: Duration,
) -> Option<DateTime<Utc>> {
    if !error.is_transport() {
        return None;
    }
    chrono::Duration::from_std(backoff)
        .ok()
        .and_then(|b| now.checked_add_signed(b))
}

/// Stored state for `def`, creating and persisting it with `init` on first
/// sight.
///
/// The definition's `enabled` flag is authoritative: a running trigger whose
/// definition is disabled is stopped, and a stopped trigger whose definition
/// is enabled again restarts at `now`.
pub(crate) fn load_state(
    store: &dyn Storage,
    def: &TriggerDefinition,
    now: DateTime<Utc>,
    init: impl FnOnce() -> TriggerState,
) -> Result<TriggerState, StorageError> {
    let Some(mut state) = store.trigger_state(&def.id)? else {
        let mut state = init();
        if !def.enabled {
            state = state.stopped();
        }
        tracing::info!(trigger = %def.id, status = %state.status, "initialized trigger state");
        commit(store, &mut state, Vec::new())?;
        return Ok(state);
    };

    match (def.enabled, state.is_running()) {
        (false, true) => state.stop(),
        (true, false) => state.start(now),
        _ => return Ok(state),
    }
    tracing::info!(trigger = %def.id, status = %state.status, "trigger status changed");
    commit(store, &mut state, Vec::new())?;
    Ok(state)
}

/// Commit `state` together with the runs it produced, keeping the local
/// copy's version in step with storage
pub(crate) fn commit(
    store: &dyn Storage,
    state: &mut TriggerState,
    runs: Vec<cadence_core::QueuedRun>,
) -> Result<CommitOutcome, StorageError> {
    let outcome = store.commit_evaluation(state.version, state.clone(), runs)?;
    state.version += 1;
    if !outcome.duplicates.is_empty() {
        tracing::debug!(
            trigger = %state.id,
            duplicates = ?outcome.duplicates,
            "dropped already-queued run keys"
        );
    }
    Ok(outcome)
}
