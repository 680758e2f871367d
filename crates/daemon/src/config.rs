// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file
//!
//! ```toml
//! repository = "analytics"
//!
//! [daemon]
//! schedule_interval = "30s"
//! max_concurrent_runs = 4
//!
//! [[schedule]]
//! name = "nightly"
//! job = "rebuild"
//! cron = "0 2 * * *"
//! command = "./triggers/nightly.sh"
//!
//! [[sensor]]
//! name = "new_files"
//! job = "ingest"
//! minimum_interval = "10s"
//! command = "./triggers/new_files.sh"
//!
//! [launcher]
//! command = "./bin/run-job"
//! ```

use cadence_adapters::CommandTrigger;
use cadence_core::{CronError, CronSchedule, TriggerDefinition, TriggerId};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("schedule {name}: {source}")]
    Cron {
        name: String,
        #[source]
        source: CronError,
    },

    #[error("duplicate trigger name: {0}")]
    DuplicateTrigger(String),

    #[error("sensor {0}: minimum_interval must be greater than zero")]
    ZeroInterval(String),

    #[error("could not determine state directory (set XDG_STATE_HOME or HOME)")]
    NoStateDir,
}

/// A concurrency limit on runs carrying a tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagLimit {
    pub key: String,
    pub value: String,
    pub limit: usize,
}

/// Loop timing and bounds (`[daemon]`)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonConfig {
    /// Longest sleep of the schedule loop
    #[serde(with = "humantime_serde")]
    pub schedule_interval: Duration,
    /// Longest sleep of the sensor loop
    #[serde(with = "humantime_serde")]
    pub sensor_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub queue_interval: Duration,
    /// Default max heartbeat age for health checks
    #[serde(with = "humantime_serde")]
    pub heartbeat_tolerance: Duration,
    /// Upper bound on one call into user code
    #[serde(with = "humantime_serde")]
    pub evaluation_timeout: Duration,
    /// How long a trigger rests after its code host was unreachable
    #[serde(with = "humantime_serde")]
    pub transport_backoff: Duration,
    pub max_catchup_ticks: usize,
    pub recent_run_keys: usize,
    pub max_concurrent_runs: Option<usize>,
    pub tag_concurrency_limits: Vec<TagLimit>,
    /// Finished runs kept in storage
    pub run_history_limit: usize,
    /// Wait for launched runs on shutdown instead of terminating them
    pub wait_for_processes: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            schedule_interval: Duration::from_secs(30),
            sensor_interval: Duration::from_secs(5),
            queue_interval: Duration::from_secs(1),
            heartbeat_tolerance: Duration::from_secs(300),
            evaluation_timeout: Duration::from_secs(60),
            transport_backoff: Duration::from_secs(60),
            max_catchup_ticks: 5,
            recent_run_keys: 100,
            max_concurrent_runs: None,
            tag_concurrency_limits: Vec::new(),
            run_history_limit: 1000,
            wait_for_processes: true,
        }
    }
}

/// Overrides for daemon file locations (`[paths]`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub state_dir: Option<PathBuf>,
    pub socket: Option<PathBuf>,
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    pub name: String,
    pub job: String,
    pub cron: String,
    pub command: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    pub name: String,
    pub job: String,
    #[serde(with = "humantime_serde")]
    pub minimum_interval: Duration,
    pub command: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    pub command: String,
}

fn enabled() -> bool {
    true
}

fn default_repository() -> String {
    "default".to_string()
}

/// Parsed configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository name that owns the configured triggers
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    pub launcher: Option<LauncherConfig>,
    #[serde(default, rename = "schedule")]
    pub schedules: Vec<ScheduleConfig>,
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        // Surface bad triggers at load time rather than on the first tick
        config.triggers()?;
        Ok(config)
    }

    /// Trigger definitions paired with their evaluation commands
    pub fn triggers(&self) -> Result<Vec<CommandTrigger>, ConfigError> {
        let mut names = HashSet::new();
        let mut triggers = Vec::with_capacity(self.schedules.len() + self.sensors.len());

        for schedule in &self.schedules {
            if !names.insert(schedule.name.as_str()) {
                return Err(ConfigError::DuplicateTrigger(schedule.name.clone()));
            }
            let cron = CronSchedule::parse(&schedule.cron).map_err(|source| ConfigError::Cron {
                name: schedule.name.clone(),
                source,
            })?;
            let mut definition = TriggerDefinition::schedule(
                TriggerId::new(&self.repository, &schedule.name),
                &schedule.job,
                cron,
            );
            if !schedule.enabled {
                definition = definition.disabled();
            }
            triggers.push(CommandTrigger {
                definition,
                command: schedule.command.clone(),
            });
        }

        for sensor in &self.sensors {
            if !names.insert(sensor.name.as_str()) {
                return Err(ConfigError::DuplicateTrigger(sensor.name.clone()));
            }
            if sensor.minimum_interval.is_zero() {
                return Err(ConfigError::ZeroInterval(sensor.name.clone()));
            }
            let mut definition = TriggerDefinition::sensor(
                TriggerId::new(&self.repository, &sensor.name),
                &sensor.job,
                sensor.minimum_interval,
            );
            if !sensor.enabled {
                definition = definition.disabled();
            }
            triggers.push(CommandTrigger {
                definition,
                command: sensor.command.clone(),
            });
        }

        Ok(triggers)
    }
}

/// Resolved on-disk locations for one daemon instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Directory holding the config file; commands run here
    pub workspace: PathBuf,
    pub state_dir: PathBuf,
    pub socket: PathBuf,
    /// Lock file, holds the daemon PID
    pub lock: PathBuf,
    pub version: PathBuf,
    pub log: PathBuf,
    pub wal: PathBuf,
    /// Per-run output of launched processes
    pub run_logs: PathBuf,
}

impl Paths {
    /// Resolve paths for the daemon configured by `config_path`.
    ///
    /// Each config file gets its own state directory and socket, keyed by a
    /// hash of its canonical path, so several daemons can coexist.
    pub fn resolve(config_path: &Path, overrides: &PathsConfig) -> Result<Self, ConfigError> {
        let canonical = config_path
            .canonicalize()
            .map_err(|e| ConfigError::Read(config_path.to_path_buf(), e))?;
        let hash = config_hash(&canonical);
        let workspace = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let state_dir = match &overrides.state_dir {
            Some(dir) => workspace.join(dir),
            None => state_root()?.join(&hash),
        };
        let socket = match &overrides.socket {
            Some(path) => workspace.join(path),
            None => socket_dir().join(format!("{}.sock", hash)),
        };
        let log = match &overrides.log {
            Some(path) => workspace.join(path),
            None => state_dir.join("daemon.log"),
        };

        Ok(Self {
            socket,
            log,
            lock: state_dir.join("daemon.pid"),
            version: state_dir.join("daemon.version"),
            wal: state_dir.join("wal").join("state.wal"),
            run_logs: state_dir.join("runs"),
            state_dir,
            workspace,
        })
    }
}

/// State root: `$XDG_STATE_HOME/cadence` or `~/.local/state/cadence`
fn state_root() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cadence"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cadence"))
}

/// Socket directory, short by default to stay under SUN_LEN.
/// Overridable with `CADENCE_SOCKET_DIR`.
fn socket_dir() -> PathBuf {
    match std::env::var("CADENCE_SOCKET_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from("/tmp/cadence"),
    }
}

/// First 16 hex chars of the SHA-256 of the config path
fn config_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
