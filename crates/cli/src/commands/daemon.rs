// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management: start, stop, status and logs

use std::path::Path;

use anyhow::Result;
use cadence_core::SystemClock;
use cadence_daemon::Paths;
use clap::{Args, Subcommand};

use crate::client::{daemon_stop, ClientError, DaemonClient};
use crate::output::{self, OutputFormat, StatusReport};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon, waiting for launched runs if configured to
    Stop,
    /// Show uptime, queue depth and per-loop heartbeats
    Status {
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Show the daemon log
    Logs {
        /// Number of lines to show
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,
    },
}

pub async fn daemon(args: DaemonArgs, config_path: &Path, paths: &Paths) -> Result<()> {
    match args.command {
        DaemonCommand::Start => start(config_path, paths).await,
        DaemonCommand::Stop => stop(paths).await,
        DaemonCommand::Status { output } => status(paths, output).await,
        DaemonCommand::Logs { lines } => logs(paths, lines),
    }
}

async fn start(config_path: &Path, paths: &Paths) -> Result<()> {
    if let Ok(client) = DaemonClient::connect(paths) {
        match client.ping().await {
            Ok(()) if version_matches(paths) => {
                println!("Daemon already running");
                return Ok(());
            }
            // A daemon from before an upgrade, or a dead daemon's socket
            _ => {
                daemon_stop(paths).await?;
            }
        }
    }

    DaemonClient::start(config_path, paths)?;
    println!("Daemon started");
    Ok(())
}

async fn stop(paths: &Paths) -> Result<()> {
    if daemon_stop(paths).await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

async fn status(paths: &Paths, format: OutputFormat) -> Result<()> {
    let client = match DaemonClient::connect(paths) {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let status = match client.status().await {
        Ok(status) => status,
        // Socket left behind by a daemon that was killed
        Err(ClientError::Io(_)) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let report = StatusReport::new(status, daemon_version(paths), &SystemClock);
    output::print(&report, format);
    Ok(())
}

fn logs(paths: &Paths, lines: usize) -> Result<()> {
    if !paths.log.exists() {
        println!("No log file found at {}", paths.log.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&paths.log)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    Ok(())
}

fn daemon_version(paths: &Paths) -> Option<String> {
    std::fs::read_to_string(&paths.version)
        .ok()
        .map(|v| v.trim().to_string())
}

fn version_matches(paths: &Paths) -> bool {
    daemon_version(paths).map_or(true, |v| v == env!("CARGO_PKG_VERSION"))
}
