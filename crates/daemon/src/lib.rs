// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadence-daemon: the supervisor that evaluates schedules and sensors and
//! launches the runs they request
//!
//! Three independent loops run as tokio tasks:
//! - the schedule loop walks cron ticks and asks user code for run requests
//! - the sensor loop polls user code at each sensor's minimum interval
//! - the run-queue loop hands queued runs to the launcher
//!
//! Each loop records a heartbeat per iteration; [`Supervisor::check_threads`]
//! and [`Supervisor::check_heartbeats`] expose liveness to outside monitors.

pub mod config;
pub mod coordinator;
mod daemon_loop;
mod evaluation;
pub mod heartbeat;
pub mod protocol;
pub mod schedules;
pub mod sensors;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{Config, ConfigError, DaemonConfig, Paths, TagLimit};
pub use coordinator::{Coordinator, DequeueReport};
pub use daemon_loop::{DaemonLoop, Iteration, LoopError};
pub use heartbeat::HeartbeatBoard;
pub use protocol::{ProtocolError, Request, Response};
pub use schedules::{ScheduleEvaluator, ScheduleReport};
pub use sensors::{SensorEvaluator, SensorReport};
pub use supervisor::{DaemonDeps, HealthError, Supervisor};
