// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};

fn make_run(clock: &FakeClock) -> QueuedRun {
    QueuedRun::new(
        RunId::from("run-1"),
        RunRequest::new().with_run_key("k"),
        Some(TriggerId::new("repo", "sched")),
        clock.now(),
    )
}

#[test]
fn new_run_is_queued() {
    let clock = FakeClock::new();
    let run = make_run(&clock);
    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(run.run_key(), Some("k"));
    assert!(!run.is_terminal());
}

#[test]
fn dequeue_then_launch_reaches_started() {
    let clock = FakeClock::new();
    let run = make_run(&clock);

    clock.advance(std::time::Duration::from_secs(1));
    let run = run.transition(RunEvent::Dequeue, clock.now());
    assert_eq!(run.status, RunStatus::Starting);
    assert_eq!(run.updated_at, clock.now());

    let run = run.transition(RunEvent::Launched, clock.now());
    assert_eq!(run.status, RunStatus::Started);
    assert!(run.is_terminal());
}

#[test]
fn launch_failure_is_terminal_with_error() {
    let clock = FakeClock::new();
    let run = make_run(&clock).transition(RunEvent::Dequeue, clock.now());

    let run = run.transition(
        RunEvent::LaunchFailed {
            error: "missing executable".to_string(),
        },
        clock.now(),
    );

    assert_eq!(run.status, RunStatus::FailedToStart);
    assert_eq!(run.error.as_deref(), Some("missing executable"));
    assert!(run.is_terminal());
}

#[test]
fn terminal_runs_ignore_further_events() {
    let clock = FakeClock::new();
    let run = make_run(&clock)
        .transition(RunEvent::Dequeue, clock.now())
        .transition(
            RunEvent::LaunchFailed {
                error: "boom".to_string(),
            },
            clock.now(),
        );

    // No automatic retry path out of FailedToStart
    let again = run.transition(RunEvent::Dequeue, clock.now());
    assert_eq!(again, run);
    let again = run.transition(RunEvent::Launched, clock.now());
    assert_eq!(again.status, RunStatus::FailedToStart);
}

#[test]
fn launched_without_dequeue_is_noop() {
    let clock = FakeClock::new();
    let run = make_run(&clock);
    let same = run.transition(RunEvent::Launched, clock.now());
    assert_eq!(same.status, RunStatus::Queued);
}

#[test]
fn status_string_roundtrip() {
    for status in [
        RunStatus::Queued,
        RunStatus::Starting,
        RunStatus::Started,
        RunStatus::FailedToStart,
    ] {
        assert_eq!(status.to_string().parse::<RunStatus>().unwrap(), status);
    }
    assert!("bogus".parse::<RunStatus>().is_err());
}
