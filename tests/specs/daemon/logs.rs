//! Daemon logs specs
//!
//! Verify daemon logs command behavior.

use crate::prelude::*;

#[test]
fn daemon_logs_shows_startup_marker() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["daemon", "logs", "--lines", "10"])
        .passes()
        .stdout_has("cadenced: starting");
}

#[test]
fn daemon_logs_shows_startup_info() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    // The log writer is non-blocking
    let ready = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.cadence()
            .args(&["daemon", "logs"])
            .passes()
            .stdout()
            .contains("Daemon ready")
    });
    assert!(ready, "daemon log should report readiness");
}

#[test]
fn daemon_logs_before_first_start() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["daemon", "logs"])
        .passes()
        .stdout_has("No log file found");
}
