// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations recorded in the write-ahead log

use cadence_core::{QueuedRun, RunId, TriggerState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Replace a trigger's state (start/stop, initialization)
    TriggerStatePut { state: TriggerState },
    /// Result of one evaluation: new runs and the advanced state, atomically
    EvaluationCommit {
        state: TriggerState,
        runs: Vec<QueuedRun>,
    },
    /// Run submitted outside a trigger evaluation
    RunAdd { run: QueuedRun },
    /// Run status change
    RunUpdate { run: QueuedRun },
    /// Terminal runs dropped from history
    RunsPrune { ids: Vec<RunId> },
    /// Full state, written as the first entry of a compacted log
    Snapshot {
        triggers: Vec<TriggerState>,
        runs: Vec<QueuedRun>,
    },
}
