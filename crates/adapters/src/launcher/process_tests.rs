// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadence_core::{FakeClock, Clock, RunRequest};
use std::time::Duration;

fn run(id: &str, request: RunRequest) -> QueuedRun {
    QueuedRun::new(RunId::new(id), request, None, FakeClock::new().now())
}

async fn wait_until_idle(launcher: &ProcessRunLauncher) {
    for _ in 0..200 {
        if launcher.active_runs().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run processes did not exit");
}

#[tokio::test]
async fn launch_passes_run_through_environment() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ProcessRunLauncher::new(
        r#"echo "$CADENCE_RUN_ID $CADENCE_JOB $CADENCE_RUN_KEY $CADENCE_TAGS""#,
        dir.path().to_path_buf(),
    )
    .with_log_dir(dir.path().join("runs"));
    let request = RunRequest::new()
        .with_job("etl")
        .with_run_key("k1")
        .with_tag("team", "data");

    launcher.launch(&run("run-1", request)).await.unwrap();
    wait_until_idle(&launcher).await;

    let log = std::fs::read_to_string(dir.path().join("runs/run-1.log")).unwrap();
    assert_eq!(log.trim(), r#"run-1 etl k1 {"team":"data"}"#);
}

#[tokio::test]
async fn launch_without_job_fails() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ProcessRunLauncher::new("true", dir.path().to_path_buf());

    let err = launcher.launch(&run("run-1", RunRequest::new())).await.unwrap_err();

    assert_eq!(err, LaunchError::MissingJob(RunId::new("run-1")));
}

#[tokio::test]
async fn launch_in_missing_directory_fails() {
    let launcher = ProcessRunLauncher::new("true", PathBuf::from("/nonexistent/cadence/runs"));

    let err = launcher
        .launch(&run("run-1", RunRequest::new().with_job("etl")))
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::SpawnFailed { .. }));
}

#[tokio::test]
async fn active_runs_tracks_live_processes() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ProcessRunLauncher::new("sleep 30", dir.path().to_path_buf());

    launcher
        .launch(&run("run-1", RunRequest::new().with_job("etl")))
        .await
        .unwrap();

    assert_eq!(launcher.active_runs().await, vec![RunId::new("run-1")]);

    // Terminating shutdown kills the sleeper instead of waiting 30s
    tokio::time::timeout(Duration::from_secs(10), launcher.shutdown(false))
        .await
        .unwrap();
    assert!(launcher.active_runs().await.is_empty());
}

#[tokio::test]
async fn waiting_shutdown_lets_runs_finish() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("done");
    let launcher = ProcessRunLauncher::new(
        format!("sleep 0.2 && touch {}", marker.display()),
        dir.path().to_path_buf(),
    );

    launcher
        .launch(&run("run-1", RunRequest::new().with_job("etl")))
        .await
        .unwrap();
    launcher.shutdown(true).await;

    assert!(marker.exists());
}
