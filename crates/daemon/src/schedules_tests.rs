// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{at, origin, run_keys, schedule, CrashingStore, REPO};
use cadence_adapters::{FakeRepository, RepositoryError};
use cadence_core::{tags, EvaluationResult, FakeClock, RunRequest, RunStatus, SequentialIdGen};
use cadence_storage::Store;

struct Fixture {
    repo: FakeRepository,
    store: Arc<dyn Storage>,
    evaluator: ScheduleEvaluator<FakeRepository, SequentialIdGen>,
}

fn fixture_with(store: Arc<dyn Storage>, config: DaemonConfig) -> Fixture {
    let repo = FakeRepository::new();
    let evaluator = ScheduleEvaluator::new(
        repo.clone(),
        Arc::clone(&store),
        SequentialIdGen::default(),
        Arc::new(config),
    );
    Fixture {
        repo,
        store,
        evaluator,
    }
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(Store::in_memory()), DaemonConfig::default())
}

fn minutely() -> TriggerDefinition {
    schedule("minutely", "* * * * *")
}

fn key(minute: u32) -> String {
    format!("{}/minutely@2026-01-01T00:{:02}:00Z", REPO, minute)
}

#[tokio::test]
async fn first_sight_starts_cursor_at_now() {
    let f = fixture();
    let def = minutely();

    let report = f.evaluator.evaluate(&def, origin()).await.unwrap();

    assert_eq!(report.evaluated_ticks, 0);
    assert_eq!(report.next_due, Some(at(0, 1, 0)));
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(origin()));
    assert_eq!(state.version, 1);
    assert!(f.repo.calls().is_empty());
}

#[tokio::test]
async fn queues_one_run_per_due_tick() {
    let f = fixture();
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 3, 30)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 3);
    assert_eq!(report.queued.len(), 3);
    assert_eq!(
        run_keys(f.store.as_ref(), RunStatus::Queued),
        vec![key(1), key(2), key(3)]
    );
    assert_eq!(
        f.repo.schedule_ticks(&def.id),
        vec![at(0, 1, 0), at(0, 2, 0), at(0, 3, 0)]
    );
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(at(0, 3, 0)));
    assert_eq!(report.next_due, Some(at(0, 4, 0)));
}

#[tokio::test]
async fn tick_at_now_is_due() {
    let f = fixture();
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 1, 0)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 1);
}

#[tokio::test]
async fn repeated_evaluation_queues_nothing_new() {
    let f = fixture();
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();
    f.evaluator.evaluate(&def, at(0, 2, 30)).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 2, 45)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 0);
    assert_eq!(run_keys(f.store.as_ref(), RunStatus::Queued).len(), 2);
}

#[tokio::test]
async fn requests_are_stamped_with_schedule_tags() {
    let f = fixture();
    let def = minutely();
    f.repo.set_response(
        &def.id,
        Ok(EvaluationResult::requests(vec![
            RunRequest::new().with_run_key("a").with_tag("team", "data"),
            RunRequest::new().with_run_key("b").with_job("other"),
            RunRequest::new().with_run_key("a"),
        ])),
    );
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 1, 30)).await.unwrap();

    // The repeated user key collapses within the tick
    assert_eq!(report.queued.len(), 2);
    let runs = f.store.runs_with_status(RunStatus::Queued).unwrap();
    let first = &runs[0];
    assert_eq!(first.run_key(), Some(format!("{}:a", key(1)).as_str()));
    assert_eq!(first.origin, Some(def.id.clone()));
    assert_eq!(first.request.job_name.as_deref(), Some("minutely_job"));
    assert_eq!(first.request.tags["team"], "data");
    assert_eq!(first.request.tags[tags::SCHEDULE_NAME], "minutely");
    assert_eq!(
        first.request.tags[tags::SCHEDULED_EXECUTION_TIME],
        "2026-01-01T00:01:00Z"
    );
    assert_eq!(runs[1].request.job_name.as_deref(), Some("other"));
}

#[tokio::test]
async fn catch_up_is_capped_to_latest_ticks() {
    let mut config = DaemonConfig::default();
    config.max_catchup_ticks = 3;
    let f = fixture_with(Arc::new(Store::in_memory()), config);
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    // Ten ticks missed while the daemon was down
    let report = f.evaluator.evaluate(&def, at(0, 10, 30)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 3);
    assert_eq!(report.skipped_ticks, 7);
    assert_eq!(
        run_keys(f.store.as_ref(), RunStatus::Queued),
        vec![key(8), key(9), key(10)]
    );
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(at(0, 10, 0)));
}

#[tokio::test]
async fn skipped_tick_advances_cursor_without_runs() {
    let f = fixture();
    let def = minutely();
    f.repo
        .set_response(&def.id, Ok(EvaluationResult::skipped("holiday")));
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 2, 30)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 2);
    assert!(report.queued.is_empty());
    assert!(report.errors.is_empty());
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(at(0, 2, 0)));
}

#[tokio::test]
async fn failing_function_still_advances_cursor() {
    let f = fixture();
    let def = minutely();
    f.repo.set_response(
        &def.id,
        Err(RepositoryError::UserCode {
            trigger: def.id.clone(),
            message: "division by zero".to_string(),
        }),
    );
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 3, 30)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 3);
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors[0].contains("division by zero"));
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(at(0, 3, 0)));
    assert_eq!(state.consecutive_failures, 3);
    assert!(state.backoff_until.is_none());
    assert!(run_keys(f.store.as_ref(), RunStatus::Queued).is_empty());

    // Recovery clears the failure count
    f.repo.set_response(&def.id, Ok(EvaluationResult::default()));
    f.evaluator.evaluate(&def, at(0, 4, 30)).await.unwrap();
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn transport_error_backs_off_the_trigger() {
    let f = fixture();
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();
    f.repo.push_response(
        &def.id,
        Err(RepositoryError::Transport {
            repository: REPO.to_string(),
            message: "connection refused".to_string(),
        }),
    );

    let report = f.evaluator.evaluate(&def, at(0, 3, 30)).await.unwrap();

    // Remaining ticks wait for the backoff to expire
    assert_eq!(report.evaluated_ticks, 1);
    assert_eq!(report.next_due, Some(at(0, 4, 30)));

    let during = f.evaluator.evaluate(&def, at(0, 4, 0)).await.unwrap();
    assert_eq!(during.evaluated_ticks, 0);

    let after = f.evaluator.evaluate(&def, at(0, 4, 30)).await.unwrap();
    assert_eq!(after.evaluated_ticks, 3);
    assert_eq!(
        run_keys(f.store.as_ref(), RunStatus::Queued),
        vec![key(2), key(3), key(4)]
    );
}

#[tokio::test(start_paused = true)]
async fn hanging_function_times_out() {
    let f = fixture();
    let def = minutely();
    f.repo.hang(&def.id);
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    let report = f.evaluator.evaluate(&def, at(0, 1, 30)).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("timed out"), "{:?}", report.errors);
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert_eq!(state.last_evaluated(), Some(at(0, 1, 0)));
    assert!(state.backoff_until.is_some());
}

#[tokio::test]
async fn disabled_schedule_is_never_evaluated() {
    let f = fixture();
    let def = minutely().disabled();

    f.evaluator.evaluate(&def, origin()).await.unwrap();
    let report = f.evaluator.evaluate(&def, at(0, 5, 0)).await.unwrap();

    assert_eq!(report, ScheduleReport::default());
    assert!(f.repo.calls().is_empty());
    assert!(!f.store.trigger_state(&def.id).unwrap().unwrap().is_running());
}

#[tokio::test]
async fn disabling_a_running_schedule_stops_it() {
    let f = fixture();
    f.evaluator.evaluate(&minutely(), origin()).await.unwrap();

    let def = minutely().disabled();
    let report = f.evaluator.evaluate(&def, at(0, 5, 0)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 0);
    assert!(f.repo.calls().is_empty());
    let state = f.store.trigger_state(&def.id).unwrap().unwrap();
    assert!(!state.is_running());
    assert_eq!(state.last_evaluated(), Some(origin()));
}

#[tokio::test]
async fn reenabled_schedule_resumes_without_backfill() {
    let f = fixture();
    f.evaluator
        .evaluate(&minutely().disabled(), origin())
        .await
        .unwrap();

    let report = f.evaluator.evaluate(&minutely(), at(0, 10, 0)).await.unwrap();
    assert_eq!(report.evaluated_ticks, 0);
    let state = f.store.trigger_state(&minutely().id).unwrap().unwrap();
    assert!(state.is_running());
    assert_eq!(state.last_evaluated(), Some(at(0, 10, 0)));

    let report = f.evaluator.evaluate(&minutely(), at(0, 11, 30)).await.unwrap();
    assert_eq!(report.evaluated_ticks, 1);
    assert_eq!(run_keys(f.store.as_ref(), RunStatus::Queued), vec![key(11)]);
}

#[tokio::test]
async fn lost_commit_is_reevaluated_exactly_once() {
    let store = Arc::new(CrashingStore::new());
    let f = fixture_with(store.clone(), DaemonConfig::default());
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();

    // The first tick's commit never lands: neither its run nor the cursor
    store.crash_next_commit();
    let result = f.evaluator.evaluate(&def, at(0, 2, 30)).await;
    assert!(result.is_err());
    assert!(run_keys(f.store.as_ref(), RunStatus::Queued).is_empty());

    f.evaluator.evaluate(&def, at(0, 2, 30)).await.unwrap();

    assert_eq!(
        run_keys(f.store.as_ref(), RunStatus::Queued),
        vec![key(1), key(2)]
    );
}

#[tokio::test]
async fn stale_cursor_never_double_queues() {
    let f = fixture();
    let def = minutely();
    f.evaluator.evaluate(&def, origin()).await.unwrap();
    let before = f.store.trigger_state(&def.id).unwrap().unwrap();
    f.evaluator.evaluate(&def, at(0, 2, 30)).await.unwrap();

    // Roll the cursor back as if the state write had been lost after the
    // runs were recorded
    let current = f.store.trigger_state(&def.id).unwrap().unwrap();
    f.store
        .put_trigger_state(TriggerState {
            version: current.version,
            ..before
        })
        .unwrap();
    let report = f.evaluator.evaluate(&def, at(0, 2, 30)).await.unwrap();

    assert_eq!(report.evaluated_ticks, 2);
    assert!(report.queued.is_empty());
    assert_eq!(
        run_keys(f.store.as_ref(), RunStatus::Queued),
        vec![key(1), key(2)]
    );
}

#[tokio::test]
async fn schedule_loop_sleeps_until_next_tick() {
    let f = fixture();
    f.repo.add_schedule(minutely());
    f.repo.add_schedule(schedule("hourly", "0 * * * *"));
    let clock = FakeClock::at(origin());
    let mut schedule_loop = ScheduleLoop::new(f.evaluator, clock.clone(), Duration::from_secs(300));

    let iteration = schedule_loop.run_iteration().await.unwrap();

    assert!(iteration.errors.is_empty());
    assert_eq!(iteration.next_wait, Duration::from_secs(30));
    assert_eq!(f.store.trigger_states().unwrap().len(), 2);
}

#[tokio::test]
async fn schedule_loop_surfaces_listing_failure() {
    let f = fixture();
    f.repo.fail_listing(Some(RepositoryError::Transport {
        repository: REPO.to_string(),
        message: "down".to_string(),
    }));
    let mut schedule_loop = ScheduleLoop::new(
        f.evaluator,
        FakeClock::at(origin()),
        Duration::from_secs(30),
    );

    let err = schedule_loop.run_iteration().await.unwrap_err();

    assert!(matches!(err, LoopError::Repository(_)));
}

#[tokio::test]
async fn schedule_loop_reports_trigger_errors() {
    let f = fixture();
    let def = minutely();
    f.repo.add_schedule(def.clone());
    f.repo.set_response(
        &def.id,
        Err(RepositoryError::UserCode {
            trigger: def.id.clone(),
            message: "boom".to_string(),
        }),
    );
    let clock = FakeClock::at(origin());
    let mut schedule_loop = ScheduleLoop::new(f.evaluator, clock.clone(), Duration::from_secs(30));
    schedule_loop.run_iteration().await.unwrap();

    clock.set(at(0, 1, 5));
    let iteration = schedule_loop.run_iteration().await.unwrap();

    assert_eq!(iteration.errors.len(), 1);
    assert!(iteration.errors[0].contains("boom"));
    assert_eq!(iteration.next_wait, Duration::from_secs(55));
}
