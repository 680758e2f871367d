// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository backed by shell commands
//!
//! Each trigger names a command. Evaluating the trigger runs the command in a
//! separate process, passes the tick or cursor through the environment and
//! reads an `EvaluationResult` as JSON from stdout. The process boundary keeps
//! user code from taking the daemon down with it.

use super::{Repository, RepositoryError};
use async_trait::async_trait;
use cadence_core::{EvaluationResult, RunRequest, TriggerDefinition, TriggerId, TriggerKind};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// A trigger definition plus the command that evaluates it
#[derive(Debug, Clone)]
pub struct CommandTrigger {
    pub definition: TriggerDefinition,
    pub command: String,
}

/// Shell-command repository
#[derive(Clone)]
pub struct CommandRepository {
    cwd: PathBuf,
    triggers: Arc<Vec<CommandTrigger>>,
}

impl CommandRepository {
    pub fn new(cwd: PathBuf, triggers: Vec<CommandTrigger>) -> Self {
        Self {
            cwd,
            triggers: Arc::new(triggers),
        }
    }

    fn definitions(&self, kind: TriggerKind) -> Vec<TriggerDefinition> {
        self.triggers
            .iter()
            .filter(|t| t.definition.kind() == kind)
            .map(|t| t.definition.clone())
            .collect()
    }

    fn find(&self, id: &TriggerId, kind: TriggerKind) -> Result<&CommandTrigger, RepositoryError> {
        self.triggers
            .iter()
            .find(|t| &t.definition.id == id && t.definition.kind() == kind)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    async fn run(
        &self,
        trigger: &CommandTrigger,
        env: &[(&str, String)],
    ) -> Result<String, RepositoryError> {
        let id = &trigger.definition.id;
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&trigger.command)
            .current_dir(&self.cwd)
            .env("CADENCE_REPOSITORY", &id.repository)
            .env("CADENCE_TRIGGER", &id.name)
            .env("CADENCE_JOB", &trigger.definition.job_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // An abandoned evaluation (timeout, shutdown) must not outlive the daemon
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd.output().await.map_err(|e| RepositoryError::Transport {
            repository: id.repository.clone(),
            message: format!("failed to spawn evaluation command: {}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("command exited with {}", output.status),
                s => s.to_string(),
            };
            return Err(RepositoryError::UserCode {
                trigger: id.clone(),
                message,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn parse_result(
    id: &TriggerId,
    stdout: &str,
    default: EvaluationResult,
) -> Result<EvaluationResult, RepositoryError> {
    if stdout.trim().is_empty() {
        return Ok(default);
    }
    serde_json::from_str(stdout).map_err(|e| RepositoryError::UserCode {
        trigger: id.clone(),
        message: format!("invalid evaluation result: {}", e),
    })
}

#[async_trait]
impl Repository for CommandRepository {
    async fn list_schedules(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        Ok(self.definitions(TriggerKind::Schedule))
    }

    async fn list_sensors(&self) -> Result<Vec<TriggerDefinition>, RepositoryError> {
        Ok(self.definitions(TriggerKind::Sensor))
    }

    async fn evaluate_schedule(
        &self,
        id: &TriggerId,
        tick: DateTime<Utc>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let trigger = self.find(id, TriggerKind::Schedule)?;
        let tick = tick.to_rfc3339_opts(SecondsFormat::Secs, true);
        let stdout = self.run(trigger, &[("CADENCE_TICK", tick)]).await?;
        // A silent schedule command asks for one run with default config
        parse_result(id, &stdout, EvaluationResult::requests(vec![RunRequest::new()]))
    }

    async fn evaluate_sensor(
        &self,
        id: &TriggerId,
        cursor: Option<&str>,
    ) -> Result<EvaluationResult, RepositoryError> {
        let trigger = self.find(id, TriggerKind::Sensor)?;
        let env = match cursor {
            Some(c) => vec![("CADENCE_CURSOR", c.to_string())],
            None => Vec::new(),
        };
        let stdout = self.run(trigger, &env).await?;
        parse_result(id, &stdout, EvaluationResult::default())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
