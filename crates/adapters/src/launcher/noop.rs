// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op run launcher

use super::{LaunchError, RunLauncher};
use async_trait::async_trait;
use cadence_core::{QueuedRun, RunId};

/// Launcher that accepts every run and executes nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRunLauncher;

impl NoOpRunLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RunLauncher for NoOpRunLauncher {
    async fn launch(&self, _run: &QueuedRun) -> Result<(), LaunchError> {
        Ok(())
    }

    async fn active_runs(&self) -> Vec<RunId> {
        Vec::new()
    }

    async fn shutdown(&self, _wait: bool) {}
}
