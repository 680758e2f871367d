//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status lifecycle.

use crate::prelude::*;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

#[test]
fn daemon_status_reports_not_running_before_start() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_start_reports_success() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
}

#[test]
fn daemon_start_twice_keeps_first_daemon() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon already running");
}

#[test]
fn daemon_status_shows_running_loops() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running")
        .stdout_has("Uptime:")
        .stdout_has("Version:")
        .stdout_has("Queued runs: 0")
        .stdout_has("scheduler")
        .stdout_has("sensor")
        .stdout_has("run_queue");
}

#[test]
fn daemon_status_json_lists_loops() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["daemon", "status", "--output", "json"])
        .passes()
        .stdout_has("\"uptime_secs\"")
        .stdout_has("\"loops\"");
}

#[test]
fn daemon_stop_reports_success() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    temp.cadence()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");
}

#[test]
fn daemon_status_reports_not_running_after_stop() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();
    temp.cadence().args(&["daemon", "stop"]).passes();

    temp.cadence()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_stop_without_daemon_is_harmless() {
    let temp = Project::empty();

    temp.cadence()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_writes_state_files() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    let dir = temp.daemon_dir().expect("daemon state directory");
    for file in ["daemon.pid", "daemon.version", "daemon.log"] {
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || dir.join(file).exists()),
            "{} should exist",
            file
        );
    }
    assert!(dir.join("wal").join("state.wal").exists());
}

#[test]
fn daemon_socket_lives_in_socket_dir() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();

    let has_socket = std::fs::read_dir(temp.state_path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().is_some_and(|ext| ext == "sock"));

    assert!(has_socket, "daemon socket file should exist");
}

#[test]
fn daemon_stop_removes_socket_and_pid() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();
    let dir = temp.daemon_dir().unwrap();

    temp.cadence().args(&["daemon", "stop"]).passes();

    assert!(!dir.join("daemon.pid").exists());
    let sockets = std::fs::read_dir(temp.state_path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "sock"))
        .count();
    assert_eq!(sockets, 0);
}

#[test]
fn daemon_exits_on_sigterm() {
    let temp = Project::empty();
    temp.cadence().args(&["daemon", "start"]).passes();
    let pid_file = temp.daemon_dir().unwrap().join("daemon.pid");
    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    kill(Pid::from_raw(pid), Signal::SIGTERM).unwrap();

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || !pid_file.exists()),
        "daemon should clean up after SIGTERM"
    );
    temp.cadence()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_start_rejects_bad_cron() {
    let temp = Project::with_config(
        r#"
[[schedule]]
name = "nightly"
job = "etl"
cron = "every night"
command = "true"
"#,
    );

    temp.cadence()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("invalid cron expression");
}

#[test]
fn daemon_start_error_log_shows_in_cli() {
    let temp = Project::empty();

    // Socket path must exceed SUN_LEN so binding fails inside the daemon
    let long_suffix =
        "this_is_a_very_long_path_segment_to_ensure_socket_path_exceeds_sun_len_limit_on_linux";
    let long_socket_dir = temp.state_path().join(long_suffix);
    std::fs::create_dir_all(&long_socket_dir).unwrap();

    temp.cadence()
        .env("CADENCE_SOCKET_DIR", &long_socket_dir)
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("Failed to bind socket")
        .stderr_lacks("Connection timeout");
}
