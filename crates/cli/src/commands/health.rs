// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health checks against a running daemon: one-shot `check` and polling `watch`

use std::time::Duration;

use anyhow::{bail, Result};
use cadence_daemon::Paths;
use clap::Args;

use crate::client::{ClientError, DaemonClient, Health};
use crate::output::{self, CheckReport, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Oldest acceptable heartbeat (default: the daemon's heartbeat_tolerance)
    #[arg(long)]
    max_age: Option<humantime::Duration>,

    #[arg(long, short, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Time between checks
    #[arg(long, default_value = "45s")]
    every: humantime::Duration,

    /// Oldest acceptable heartbeat
    #[arg(long, default_value = "5m")]
    max_age: humantime::Duration,
}

/// Run both health checks, collecting every failure message
async fn probe(paths: &Paths, max_age: Option<Duration>) -> Result<Vec<String>, ClientError> {
    let client = DaemonClient::connect(paths)?;
    let mut failures = Vec::new();
    if let Health::Unhealthy(f) = client.check_threads().await? {
        failures.extend(f);
    }
    if let Health::Unhealthy(f) = client.check_heartbeats(max_age).await? {
        failures.extend(f);
    }
    Ok(failures)
}

pub async fn check(args: CheckArgs, paths: &Paths) -> Result<()> {
    let failures = probe(paths, args.max_age.map(Into::into)).await?;
    let report = CheckReport::from_failures(failures);

    match args.output {
        OutputFormat::Text if !report.healthy => {
            bail!("daemon unhealthy: {}", report.failures.join("; "))
        }
        format => output::print(&report, format),
    }
    if !report.healthy {
        bail!("daemon unhealthy");
    }
    Ok(())
}

/// Poll until the daemon fails a check or stops answering
pub async fn watch(args: WatchArgs, paths: &Paths) -> Result<()> {
    let every: Duration = args.every.into();
    let max_age: Duration = args.max_age.into();
    let mut checks: u64 = 0;

    loop {
        match probe(paths, Some(max_age)).await {
            Ok(failures) if failures.is_empty() => {
                checks += 1;
                println!("healthy (check {})", checks);
            }
            Ok(failures) => bail!("daemon unhealthy: {}", failures.join("; ")),
            Err(e) => bail!("daemon unreachable: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(every) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("stopped after {} checks", checks);
                return Ok(());
            }
        }
    }
}
