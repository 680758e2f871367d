// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadence-core: data model for the cadence orchestration daemon
//!
//! This crate provides:
//! - Trigger definitions (schedules and sensors) and their persisted state
//! - Run requests, queued runs and their status state machine
//! - Heartbeats emitted by daemon loops
//! - Pure tick/poll planning used by the daemon evaluators

pub mod clock;
pub mod id;

pub mod cron;
pub mod dedup;
pub mod heartbeat;
pub mod request;
pub mod run;
pub mod schedule;
pub mod sensor;
pub mod state;
pub mod trigger;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock, TimerClock};
pub use cron::{CronError, CronSchedule};
pub use dedup::RecentKeys;
pub use heartbeat::{DaemonKind, Heartbeat, LoopStatus};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use request::{tags, EvaluationResult, RunRequest};
pub use run::{QueuedRun, RunEvent, RunId, RunStatus};
pub use schedule::TickPlan;
pub use sensor::SensorBatch;
pub use state::{TriggerCursor, TriggerState, TriggerStatus};
pub use trigger::{Cadence, TriggerDefinition, TriggerId, TriggerKind};
