// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher that starts each run as a child process

use super::{LaunchError, RunLauncher};
use async_trait::async_trait;
use cadence_core::{QueuedRun, RunId};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::{Child, Command};

/// Runs `sh -c <command>` once per run.
///
/// The run is described to the command through the environment:
/// `CADENCE_RUN_ID`, `CADENCE_JOB`, `CADENCE_RUN_KEY`, `CADENCE_RUN_CONFIG`
/// and `CADENCE_TAGS` (both JSON). Output goes to `<log_dir>/<run id>.log`
/// when a log directory is set.
#[derive(Clone)]
pub struct ProcessRunLauncher {
    command: String,
    cwd: PathBuf,
    log_dir: Option<PathBuf>,
    children: Arc<Mutex<HashMap<RunId, Child>>>,
}

impl ProcessRunLauncher {
    pub fn new(command: impl Into<String>, cwd: PathBuf) -> Self {
        Self {
            command: command.into(),
            cwd,
            log_dir: None,
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = Some(log_dir);
        self
    }

    fn output(&self, run: &RunId) -> Result<(Stdio, Stdio), std::io::Error> {
        let Some(dir) = &self.log_dir else {
            return Ok((Stdio::null(), Stdio::null()));
        };
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}.log", run)))?;
        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }

    fn take_children(&self) -> Vec<(RunId, Child)> {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.drain().collect()
    }
}

#[async_trait]
impl RunLauncher for ProcessRunLauncher {
    async fn launch(&self, run: &QueuedRun) -> Result<(), LaunchError> {
        let job = run
            .request
            .job_name
            .as_deref()
            .ok_or_else(|| LaunchError::MissingJob(run.id.clone()))?;
        let spawn_failed = |e: &dyn std::fmt::Display| LaunchError::SpawnFailed {
            run: run.id.clone(),
            message: e.to_string(),
        };

        let config = serde_json::to_string(&run.request.run_config).map_err(|e| spawn_failed(&e))?;
        let tags = serde_json::to_string(&run.request.tags).map_err(|e| spawn_failed(&e))?;
        let (stdout, stderr) = self.output(&run.id).map_err(|e| spawn_failed(&e))?;

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .env("CADENCE_RUN_ID", run.id.as_str())
            .env("CADENCE_JOB", job)
            .env("CADENCE_RUN_KEY", run.run_key().unwrap_or_default())
            .env("CADENCE_RUN_CONFIG", config)
            .env("CADENCE_TAGS", tags)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| spawn_failed(&e))?;

        tracing::debug!(run_id = %run.id, pid = ?child.id(), "run process spawned");
        self.children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(run.id.clone(), child);
        Ok(())
    }

    async fn active_runs(&self) -> Vec<RunId> {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        // Reap exited children so the table only holds live processes
        children.retain(|run_id, child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!(run_id = %run_id, %status, "run process exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "failed to poll run process");
                false
            }
        });
        children.keys().cloned().collect()
    }

    async fn shutdown(&self, wait: bool) {
        for (run_id, mut child) in self.take_children() {
            if !wait {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(run_id = %run_id, error = %e, "failed to kill run process");
                }
            }
            match child.wait().await {
                Ok(status) => tracing::info!(run_id = %run_id, %status, "run process exited"),
                Err(e) => tracing::warn!(run_id = %run_id, error = %e, "failed to wait for run process"),
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
