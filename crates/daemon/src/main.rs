// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cadence daemon (cadenced)
//!
//! Background process that evaluates schedules and sensors and launches the
//! runs they request. Usage: `cadenced [path/to/cadence.toml]`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;
mod server;

use std::path::{Path, PathBuf};

use cadence_daemon::{Config, Paths};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::lifecycle::{log_location, LifecycleError};

/// Config file used when none is given on the command line
const DEFAULT_CONFIG: &str = "cadence.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = Config::load(&config_path)?;
    let paths = Paths::resolve(&config_path, &config.paths)?;

    // Precedes subscriber setup so the CLI can find where this attempt begins
    write_startup_marker(&paths.log)?;

    let log_guard = setup_logging(&paths.log)?;

    info!("Starting cadenced for config: {}", config_path.display());

    let mut daemon = match lifecycle::startup(config, &paths).await {
        Ok(d) => d,
        Err(e) => {
            // The non-blocking writer may not flush before exit
            write_startup_error(&paths.log, &e);
            error!(error = %e, "startup failed");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %paths.socket.display(), "Daemon ready");

    // The CLI and service managers wait for this line
    println!("READY");

    let reason = loop {
        tokio::select! {
            accepted = daemon.listener.accept() => match accepted {
                Ok((stream, _)) => {
                    if let Err(e) = server::handle_connection(&mut daemon, stream).await {
                        warn!(error = %e, "health socket request failed");
                    }
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            },
            _ = sigterm.recv() => break "SIGTERM",
            _ = sigint.recv() => break "SIGINT",
        }

        if daemon.shutdown_requested {
            break "shutdown request";
        }
    };

    info!(reason, "shutting down");
    daemon.shutdown().await?;
    info!("Daemon stopped");
    Ok(())
}

/// First line of every startup attempt in the log:
/// `--- cadenced: starting (pid: 12345) ---`
pub const STARTUP_MARKER_PREFIX: &str = "--- cadenced: starting (pid: ";

fn write_startup_marker(log: &Path) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Append the startup error directly, bypassing tracing
fn write_startup_error(log: &Path, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    log: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (dir, file) = log_location(log)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
