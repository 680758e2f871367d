//! Health check specs
//!
//! `cadence check` asks the daemon whether every loop is alive and beating.

use crate::prelude::*;

#[test]
fn check_passes_for_running_daemon() {
    let temp = Project::with_config(FAST_DAEMON);
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["check", "--max-age", "30s"])
        .passes()
        .stdout_has("healthy");
}

#[test]
fn check_uses_daemon_tolerance_by_default() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence().args(&["check"]).passes().stdout_has("healthy");
}

#[test]
fn check_fails_without_daemon() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["check"])
        .fails()
        .stderr_has("Daemon not running");
}

#[test]
fn check_prints_json_report() {
    let temp = Project::with_config(FAST_DAEMON);
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["check", "--output", "json"])
        .passes()
        .stdout_has("\"healthy\": true")
        .stdout_has("\"failures\": []");
}

#[test]
fn failing_trigger_does_not_make_daemon_unhealthy() {
    let temp = Project::with_config(&format!(
        r#"{}
[[schedule]]
name = "broken"
job = "etl"
cron = "* * * * * *"
command = "echo 'division by zero' >&2; exit 3"
"#,
        FAST_DAEMON
    ));
    temp.cadence().args(&["daemon", "start"]).passes();

    let failed = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.cadence()
            .args(&["daemon", "status"])
            .passes()
            .stdout()
            .contains("division by zero")
    });
    assert!(failed, "scheduler heartbeat should carry the trigger error");

    temp.cadence()
        .args(&["check", "--max-age", "30s"])
        .passes()
        .stdout_has("healthy");
}
