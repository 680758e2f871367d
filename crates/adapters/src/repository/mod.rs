// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository adapters: hosts of user schedule and sensor code

mod command;

pub use command::{CommandRepository, CommandTrigger};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRepository, RepositoryCall};

use async_trait::async_trait;
use cadence_core::{EvaluationResult, TriggerDefinition, TriggerId};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors from repository calls
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    /// The evaluation function failed or returned data that could not be used
    #[error("{trigger}: evaluation failed: {message}")]
    UserCode { trigger: TriggerId, message: String },
    /// The environment hosting user code could not be reached
    #[error("repository {repository} unreachable: {message}")]
    Transport { repository: String, message: String },
    #[error("trigger not found: {0}")]
    NotFound(TriggerId),
    #[error("{trigger}: evaluation timed out after {after:?}")]
    Timeout { trigger: TriggerId, after: Duration },
}

impl RepositoryError {
    /// Errors that indicate the code host itself is unhealthy.
    ///
    /// Triggers that hit one of these are backed off before the next attempt.
    /// A hung evaluation counts: retrying it right away would only tie up the
    /// loop again.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RepositoryError::Transport { .. } | RepositoryError::Timeout { .. }
        )
    }
}

/// A set of repositories exposing schedules and sensors.
///
/// Definitions carry their owning repository in [`TriggerId::repository`],
/// so a single adapter can front several repositories.
#[async_trait]
pub trait Repository: Clone + Send + Sync + 'static {
    async fn list_schedules(&self) -> Result<Vec<TriggerDefinition>, RepositoryError>;

    async fn list_sensors(&self) -> Result<Vec<TriggerDefinition>, RepositoryError>;

    /// Run a schedule's evaluation function for one tick
    async fn evaluate_schedule(
        &self,
        id: &TriggerId,
        tick: DateTime<Utc>,
    ) -> Result<EvaluationResult, RepositoryError>;

    /// Run a sensor's evaluation function with the cursor it last returned
    async fn evaluate_sensor(
        &self,
        id: &TriggerId,
        cursor: Option<&str>,
    ) -> Result<EvaluationResult, RepositoryError>;
}
