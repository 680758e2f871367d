// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health socket: one request and one response per connection

use std::time::Duration;

use cadence_daemon::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};
use cadence_daemon::HealthError;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::lifecycle::DaemonState;

/// Answer the request waiting on `stream`
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(request) => request,
        // Probes that connect and hang up (e.g. socket existence checks)
        Err(ProtocolError::ConnectionClosed) => return Ok(()),
        Err(ProtocolError::Timeout) => return Err(ServerError::Timeout),
        Err(e) => return Err(e.into()),
    };

    let response = handle_request(daemon, &request);
    debug!(?request, ?response, "health socket request");

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

fn health(result: Result<(), HealthError>) -> Response {
    match result {
        Ok(()) => Response::Healthy,
        Err(e) => {
            warn!(error = %e, "health check failed");
            Response::Unhealthy {
                failures: vec![e.to_string()],
            }
        }
    }
}

fn handle_request(daemon: &mut DaemonState, request: &Request) -> Response {
    match *request {
        Request::Ping => Response::Pong,

        Request::Status => match daemon.supervisor.queued_runs() {
            Ok(queued_runs) => Response::Status {
                uptime_secs: daemon.supervisor.uptime().as_secs(),
                loops: daemon.supervisor.heartbeats(),
                queued_runs,
            },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::CheckThreads => health(daemon.supervisor.check_threads()),

        Request::CheckHeartbeats { max_age_secs } => {
            let max_age = max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(daemon.config.heartbeat_tolerance);
            health(daemon.supervisor.check_heartbeats(max_age))
        }

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("client sent no request within {:?}", DEFAULT_TIMEOUT)]
    Timeout,
}
