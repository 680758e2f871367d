// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier generation

use crate::run::RunId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique run identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next_run_id(&self) -> RunId;
}

/// UUID-based generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_run_id(&self) -> RunId {
        RunId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential generator for tests: `run-1`, `run-2`, ...
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("run")
    }
}

impl IdGen for SequentialIdGen {
    fn next_run_id(&self) -> RunId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        RunId::new(format!("{}-{}", self.prefix, n))
    }
}
