//! Watch specs
//!
//! `cadence watch` keeps checking until the daemon fails a check.

use crate::prelude::*;

#[test]
fn watch_fails_loudly_when_daemon_goes_away() {
    let temp = Project::with_config(FAST_DAEMON);
    temp.cadence().args(&["daemon", "start"]).passes();

    let mut watcher = temp
        .cadence()
        .args(&["watch", "--every", "100ms", "--max-age", "30s"])
        .spawn();
    std::thread::sleep(std::time::Duration::from_millis(500));
    assert!(
        watcher.try_wait().unwrap().is_none(),
        "watch should keep running while the daemon is healthy"
    );

    temp.cadence().args(&["daemon", "stop"]).passes();

    let mut status = None;
    let exited = wait_for(SPEC_WAIT_MAX_MS, || {
        status = watcher.try_wait().unwrap();
        status.is_some()
    });
    assert!(exited, "watch should exit once the daemon stops");
    assert!(!status.unwrap().success());
}

#[test]
fn watch_fails_immediately_without_daemon() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["watch", "--every", "1s"])
        .fails()
        .stderr_has("daemon unreachable");
}
