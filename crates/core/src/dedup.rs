// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded set of recently seen run keys
//!
//! A sensor remembers the last `capacity` run keys it produced so that
//! repeated firings for the same logical event are suppressed across polls.
//! The oldest key is evicted first; the set never grows past its capacity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentKeys {
    capacity: usize,
    keys: VecDeque<String>,
}

impl RecentKeys {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Record a key. Returns false if it was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.capacity == 0 || self.contains(&key) {
            return self.capacity == 0;
        }
        while self.keys.len() >= self.capacity {
            self.keys.pop_front();
        }
        self.keys.push_back(key);
        true
    }

    /// Change the capacity, evicting the oldest keys if shrinking
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.keys.len() > capacity {
            self.keys.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
