// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory heartbeat board shared by the loops and health queries

use cadence_core::{DaemonKind, Heartbeat};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct Slots {
    scheduler: Mutex<Heartbeat>,
    sensor: Mutex<Heartbeat>,
    run_queue: Mutex<Heartbeat>,
}

/// One heartbeat slot per loop, each behind its own lock so a loop writing
/// its beat never contends with the other loops.
#[derive(Clone)]
pub struct HeartbeatBoard {
    slots: Arc<Slots>,
    started_at: DateTime<Utc>,
}

impl HeartbeatBoard {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            slots: Arc::new(Slots {
                scheduler: Mutex::new(Heartbeat::starting(DaemonKind::Scheduler)),
                sensor: Mutex::new(Heartbeat::starting(DaemonKind::Sensor)),
                run_queue: Mutex::new(Heartbeat::starting(DaemonKind::RunQueue)),
            }),
            started_at,
        }
    }

    fn slot(&self, kind: DaemonKind) -> MutexGuard<'_, Heartbeat> {
        let slot = match kind {
            DaemonKind::Scheduler => &self.slots.scheduler,
            DaemonKind::Sensor => &self.slots.sensor,
            DaemonKind::RunQueue => &self.slots.run_queue,
        };
        slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn beat(&self, kind: DaemonKind, now: DateTime<Utc>, errors: Vec<String>) {
        self.slot(kind).beat(now, errors);
    }

    pub fn stop(&self, kind: DaemonKind) {
        self.slot(kind).stop();
    }

    pub fn get(&self, kind: DaemonKind) -> Heartbeat {
        self.slot(kind).clone()
    }

    pub fn all(&self) -> Vec<Heartbeat> {
        DaemonKind::ALL.iter().map(|k| self.get(*k)).collect()
    }

    /// Loops whose last beat is older than `max_age` at `now`
    pub fn stale(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<DaemonKind> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        DaemonKind::ALL
            .into_iter()
            .filter(|kind| self.slot(*kind).is_stale(now, self.started_at, max_age))
            .collect()
    }
}
