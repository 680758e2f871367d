// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadence_core::{TriggerId, TriggerState};
use chrono::{TimeZone, Utc};

fn state(name: &str) -> TriggerState {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    TriggerState::schedule(TriggerId::new("repo", name), at)
}

fn put(name: &str) -> Operation {
    Operation::TriggerStatePut { state: state(name) }
}

#[test]
fn wal_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&put("a")).unwrap();
        wal.append(&Operation::RunsPrune { ids: vec![] }).unwrap();
    }

    let ops = Wal::replay(&path).unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0], put("a"));
    assert!(matches!(ops[1], Operation::RunsPrune { .. }));
}

#[test]
fn wal_sequence_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 0);
        assert!(wal.is_empty());
        wal.append(&put("a")).unwrap();
        assert_eq!(wal.sequence(), 1);
    }

    {
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 1);
        assert_eq!(wal.len(), 1);
    }
}

#[test]
fn wal_replay_nonexistent() {
    let path = Path::new("/nonexistent/path/wal");
    let ops = Wal::replay(path).unwrap();
    assert!(ops.is_empty());
}

#[test]
fn torn_trailing_entry_is_truncated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&put("a")).unwrap();
    }
    // Simulate a crash halfway through writing the next entry
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"seq\":2,\"op\":{{\"type\":\"trig").unwrap();
    }

    assert_eq!(Wal::replay(&path).unwrap().len(), 1);

    {
        let mut wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 1);
        wal.append(&put("b")).unwrap();
    }

    let ops = Wal::replay(&path).unwrap();
    assert_eq!(ops, vec![put("a"), put("b")]);
}

#[test]
fn corruption_before_the_tail_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");
    std::fs::write(&path, "garbage\n").unwrap();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        let line = serde_json::to_string(&WalEntry { seq: 1, op: put("a") }).unwrap();
        writeln!(file, "{}", line).unwrap();
    }

    assert!(matches!(Wal::replay(&path), Err(WalError::Json(_))));
    assert!(matches!(Wal::open(&path), Err(WalError::Json(_))));
}

#[test]
fn rewrite_replaces_contents_and_keeps_sequence_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path).unwrap();
    for name in ["a", "b", "c"] {
        wal.append(&put(name)).unwrap();
    }
    wal.rewrite(&[put("c")]).unwrap();
    assert_eq!(wal.len(), 1);
    assert_eq!(wal.sequence(), 4);

    wal.append(&put("d")).unwrap();
    assert_eq!(wal.sequence(), 5);

    let ops = Wal::replay(&path).unwrap();
    assert_eq!(ops, vec![put("c"), put("d")]);
}
