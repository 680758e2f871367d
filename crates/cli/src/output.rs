// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;
use std::time::Duration;

use cadence_core::{Clock, DaemonKind, LoopStatus};
use clap::ValueEnum;
use serde::Serialize;

use crate::client::DaemonStatus;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// One loop's line in `daemon status`
#[derive(Debug, Serialize)]
pub struct LoopView {
    pub daemon: DaemonKind,
    pub status: LoopStatus,
    pub iterations: u64,
    /// Seconds since the last completed iteration
    pub last_beat_secs: Option<u64>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub version: Option<String>,
    pub uptime_secs: u64,
    pub queued_runs: usize,
    pub loops: Vec<LoopView>,
}

impl StatusReport {
    pub fn new(status: DaemonStatus, version: Option<String>, clock: &impl Clock) -> Self {
        let now = clock.now();
        let loops = status
            .loops
            .into_iter()
            .map(|hb| LoopView {
                daemon: hb.daemon,
                status: hb.status,
                iterations: hb.iterations,
                last_beat_secs: hb
                    .timestamp
                    .and_then(|ts| (now - ts).to_std().ok())
                    .map(|age| age.as_secs()),
                errors: hb.errors,
            })
            .collect();
        Self {
            version,
            uptime_secs: status.uptime.as_secs(),
            queued_runs: status.queued_runs,
            loops,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: running")?;
        writeln!(f, "Version: {}", self.version.as_deref().unwrap_or("unknown"))?;
        writeln!(
            f,
            "Uptime: {}",
            humantime::format_duration(Duration::from_secs(self.uptime_secs))
        )?;
        writeln!(f, "Queued runs: {}", self.queued_runs)?;
        write!(f, "Loops:")?;
        for lp in &self.loops {
            let beat = match lp.last_beat_secs {
                Some(secs) => format!("{}s ago", secs),
                None => "never".to_string(),
            };
            write!(
                f,
                "\n  {:<10} {:<9} iterations={:<6} last beat {}",
                lp.daemon.to_string(),
                lp.status.to_string(),
                lp.iterations,
                beat
            )?;
            for error in &lp.errors {
                write!(f, "\n    error: {}", error)?;
            }
        }
        Ok(())
    }
}

/// Combined result of the thread and heartbeat checks
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub healthy: bool,
    pub failures: Vec<String>,
}

impl CheckReport {
    pub fn from_failures(failures: Vec<String>) -> Self {
        Self {
            healthy: failures.is_empty(),
            failures,
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.healthy {
            return write!(f, "healthy");
        }
        write!(f, "unhealthy")?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
