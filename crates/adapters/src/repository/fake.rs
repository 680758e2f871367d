// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake repository for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Repository, RepositoryError};
use async_trait::async_trait;
use cadence_core::{EvaluationResult, RunRequest, TriggerDefinition, TriggerId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Recorded repository call
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryCall {
    ListSchedules,
    ListSensors,
    EvaluateSchedule {
        id: TriggerId,
        tick: DateTime<Utc>,
    },
    EvaluateSensor {
        id: TriggerId,
        cursor: Option<String>,
    },
}

#[derive(Clone)]
enum Response {
    Reply(Result<EvaluationResult, RepositoryError>),
    /// Never returns, like a deadlocked user function
    Hang,
}

#[derive(Default)]
struct FakeState {
    schedules: Vec<TriggerDefinition>,
    sensors: Vec<TriggerDefinition>,
    /// One-shot responses, consumed before the standing response
    queued: HashMap<TriggerId, VecDeque<Response>>,
    standing: HashMap<TriggerId, Response>,
    list_error: Option<RepositoryError>,
    calls: Vec<RepositoryCall>,
}

/// In-memory repository with scripted evaluation results.
///
/// Without a scripted response a schedule asks for one default run per
/// tick and a sensor asks for nothing.
#[derive(Clone, Default)]
pub struct FakeRepository {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_schedule(&self, definition: TriggerDefinition) {
        self.state().schedules.push(definition);
    }

    pub fn add_sensor(&self, definition: TriggerDefinition) {
        self.state().sensors.push(definition);
    }

    /// Replace every definition, like a code reload
    pub fn replace_definitions(
        &self,
        schedules: Vec<TriggerDefinition>,
        sensors: Vec<TriggerDefinition>,
    ) {
        let mut state = self.state();
        state.schedules = schedules;
        state.sensors = sensors;
    }

    /// Answer every evaluation of `id` with `result`
    pub fn set_response(&self, id: &TriggerId, result: Result<EvaluationResult, RepositoryError>) {
        self.state()
            .standing
            .insert(id.clone(), Response::Reply(result));
    }

    /// Answer the next evaluation of `id` with `result`
    pub fn push_response(&self, id: &TriggerId, result: Result<EvaluationResult, RepositoryError>) {
        self.state()
            .queued
            .entry(id.clone())
            .or_default()
            .push_back(Response::Reply(result));
    }

    /// Make every evaluation of `id` block forever
    pub fn hang(&self, id: &TriggerId) {
        self.state().standing.insert(id.clone(), Response::Hang);
    }

    /// Fail listing calls, as if the code host were down
    pub fn fail_listing(&self, error: Option<RepositoryError>) {
        self.state().list_error = error;
    }

    pub fn calls(&self) -> Vec<RepositoryCall> {
        self.state().calls.clone()
    }

    pub fn schedule_ticks(&self, id: &TriggerId) -> Vec<DateTime<Utc>> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                RepositoryCall::EvaluateSchedule { id: called, tick } if called == id => {
                    Some(*tick)
                }
                _ => None,
            })
            .collect()
    }

    pub fn sensor_polls(&self, id: &TriggerId) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, RepositoryCall::EvaluateSensor { id: called, .. } if called == id))
            .count()
    }

    fn next_response(&self, id: &TriggerId, call: RepositoryCall) -> Option<Response> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(response) = state.queued.get_mut(id).and_then(|q| q.pop_front()) {
            return Some(response);
        }
        state.standing.get(id).cloned()
    }
}

async fn respond(
    response: Option<Response>,
    default: EvaluationResult,
) -> Result<EvaluationResult, RepositoryError> {
    match response {
        Some(Response::Reply(result)) => result,
        Some(Response::Hang) => std::future::pending().await,
        None => Ok(default),
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn list_schedules(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        let mut state = self.state();
        state.calls.push(RepositoryCall::ListSchedules);
        match &state.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.schedules.clone()),
        }
    }

    async fn list_sensors(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        let mut state = self.state();
        state.calls.push(RepositoryCall::ListSensors);
        match &state.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.sensors.clone()),
        }
    }

    async fn evaluate_schedule(
        &self,
        id: &TriggerId,
        tick: DateTime<Utc>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let response = self.next_response(
            id,
            RepositoryCall::EvaluateSchedule {
                id: id.clone(),
                tick,
            },
        );
        respond(response, EvaluationResult::requests(vec![RunRequest::new()])).await
    }

    async fn evaluate_sensor(
        &self,
        id: &TriggerId,
        cursor: Option<&str>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let response = self.next_response(
            id,
            RepositoryCall::EvaluateSensor {
                id: id.clone(),
                cursor: cursor.map(String::from),
            },
        );
        respond(response, EvaluationResult::default()).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
