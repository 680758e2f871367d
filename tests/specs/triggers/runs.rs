//! Trigger-to-run specs
//!
//! Sensors and schedules evaluated by the daemon turn into launched runs.

use crate::prelude::*;

fn launched(temp: &Project) -> Vec<String> {
    temp.read("launched.txt")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn sensor_run_key_launches_exactly_once() {
    let temp = Project::with_config(&format!(
        r#"{}
[launcher]
command = "echo \"$CADENCE_RUN_KEY\" >> launched.txt"

[[sensor]]
name = "inbox"
job = "ingest"
minimum_interval = "200ms"
command = "echo '{{\"run_requests\": [{{\"run_key\": \"file-1\"}}]}}'"
"#,
        FAST_DAEMON
    ));
    temp.cadence().args(&["daemon", "start"]).passes();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || !launched(&temp).is_empty()));
    // Many more polls return the same key
    std::thread::sleep(std::time::Duration::from_millis(1_000));

    assert_eq!(launched(&temp), vec!["default/inbox:file-1"]);
}

#[test]
fn sensor_cursor_survives_restart() {
    let temp = Project::with_config(&format!(
        r#"{}
[[sensor]]
name = "counter"
job = "ingest"
minimum_interval = "200ms"
command = "echo \"${{CADENCE_CURSOR:-none}}\" >> cursors.txt; echo '{{\"cursor\": \"seen\"}}'"
"#,
        FAST_DAEMON
    ));
    temp.cadence().args(&["daemon", "start"]).passes();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || temp
        .read("cursors.txt")
        .lines()
        .count()
        >= 2));
    temp.cadence().args(&["daemon", "stop"]).passes();
    let before = temp.read("cursors.txt").lines().count();

    temp.cadence().args(&["daemon", "start"]).passes();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || temp
        .read("cursors.txt")
        .lines()
        .count()
        > before));

    let cursors = temp.read("cursors.txt");
    let lines: Vec<&str> = cursors.lines().collect();
    assert_eq!(lines[0], "none");
    assert!(lines[1..].iter().all(|c| *c == "seen"), "{:?}", lines);
}

#[test]
fn disabled_schedule_never_runs() {
    let temp = Project::with_config(&format!(
        r#"{}
[launcher]
command = "echo \"$CADENCE_RUN_KEY\" >> launched.txt"

[[schedule]]
name = "paused"
job = "etl"
cron = "* * * * * *"
command = "true"
enabled = false
"#,
        FAST_DAEMON
    ));
    temp.cadence().args(&["daemon", "start"]).passes();

    std::thread::sleep(std::time::Duration::from_millis(2_500));

    assert!(launched(&temp).is_empty());
}

#[test]
fn every_second_schedule_launches_per_tick() {
    let temp = Project::with_config(&format!(
        r#"{}
[launcher]
command = "echo \"$CADENCE_RUN_KEY\" >> launched.txt"

[[schedule]]
name = "heartbeat"
job = "ping"
cron = "* * * * * *"
command = "true"
"#,
        FAST_DAEMON
    ));
    temp.cadence().args(&["daemon", "start"]).passes();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || launched(&temp).len() >= 2));

    let keys = launched(&temp);
    assert!(keys.iter().all(|k| k.starts_with("default/heartbeat@")));
    let mut unique = keys.clone();
    unique.dedup();
    assert_eq!(unique, keys, "no tick should launch twice");
}
