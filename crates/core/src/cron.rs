// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron cadence for schedules
//!
//! Expressions have five fields (minute precision) or six with a leading
//! seconds field. All evaluation happens in UTC.

use chrono::{DateTime, Utc};
use croner::Cron;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors from parsing a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("invalid cron expression {expr:?}: {message}")]
    Invalid { expr: String, message: String },
}

/// A parsed cron expression
#[derive(Clone)]
pub struct CronSchedule {
    expr: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let cron = Cron::new(expr)
            .with_seconds_optional()
            .parse()
            .map_err(|e| CronError::Invalid {
                expr: expr.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            expr: expr.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// First tick strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }

    /// Ticks in the half-open interval `(after, until]`, in order
    pub fn ticks_between(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Ticks<'_> {
        Ticks {
            schedule: self,
            cursor: after,
            until,
        }
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expr).finish()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Serialize for CronSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expr)
    }
}

impl<'de> Deserialize<'de> for CronSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        CronSchedule::parse(&expr).map_err(serde::de::Error::custom)
    }
}

/// Lazy iterator over the ticks of a schedule
pub struct Ticks<'a> {
    schedule: &'a CronSchedule,
    cursor: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl Iterator for Ticks<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.schedule.next_after(self.cursor)?;
        if next > self.until {
            return None;
        }
        self.cursor = next;
        Some(next)
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
