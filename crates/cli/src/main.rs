// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cadence - schedule and sensor daemon CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use cadence_daemon::{Config, Paths};
use clap::{Parser, Subcommand};
use commands::{daemon, health};

#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Cadence - runs scheduled and sensor-triggered jobs"
)]
struct Cli {
    /// Config file of the daemon to talk to
    #[arg(long, short, global = true, default_value = "cadence.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Check daemon loops once; exits non-zero when unhealthy
    Check(health::CheckArgs),
    /// Check daemon loops repeatedly until one fails
    Watch(health::WatchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let paths = Paths::resolve(&cli.config, &config.paths)?;

    match cli.command {
        Commands::Daemon(args) => daemon::daemon(args, &cli.config, &paths).await,
        Commands::Check(args) => health::check(args, &paths).await,
        Commands::Watch(args) => health::watch(args, &paths).await,
    }
}
