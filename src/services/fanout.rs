// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded concurrent fan-out over independent units of work, and the
//! per-invocation report jobs return.
//!
//! A unit is one task, one user or one token. Each unit's error is captured
//! in the report and never cancels its siblings.

use crate::error::AppError;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::future::Future;

/// Upper bound on units processed concurrently within one invocation.
pub const MAX_CONCURRENT_UNITS: usize = 32;

/// What happened to a unit that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The job changed something (sent, spawned, pruned)
    Acted,
    /// Nothing to do for this unit
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Outcome of one job invocation.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    /// Evaluation instant (RFC 3339)
    pub ran_at: String,
    pub acted: u32,
    pub skipped: u32,
    pub failed: u32,
    pub failures: Vec<UnitFailure>,
}

impl JobReport {
    pub fn new(job: &'static str, now_ms: i64) -> Self {
        Self {
            job,
            ran_at: format_utc_rfc3339(
                DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_default(),
            ),
            acted: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    /// Tally one unit.
    ///
    /// Undecodable documents are data errors: they are skipped with a
    /// warning rather than counted as failures.
    pub fn record(&mut self, unit: &str, result: Result<UnitOutcome, AppError>) {
        match result {
            Ok(UnitOutcome::Acted) => self.acted += 1,
            Ok(UnitOutcome::Skipped) => self.skipped += 1,
            Err(e) if e.is_data_error() => {
                tracing::warn!(job = self.job, unit, error = %e, "Skipping malformed document");
                self.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(job = self.job, unit, error = %e, "Unit failed");
                self.failed += 1;
                self.failures.push(UnitFailure {
                    unit: unit.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Log the summary and hand the report back.
    pub fn finish(self) -> Self {
        tracing::info!(
            job = self.job,
            acted = self.acted,
            skipped = self.skipped,
            failed = self.failed,
            "Job pass complete"
        );
        self
    }

    /// Returns true if no unit failed.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Returns true if units failed and none succeeded in acting.
    pub fn is_complete_failure(&self) -> bool {
        self.acted == 0 && self.failed > 0
    }

    /// Returns true if some units acted and some failed.
    pub fn is_partial_failure(&self) -> bool {
        self.acted > 0 && self.failed > 0
    }
}

/// Run `work` over every unit with at most [`MAX_CONCURRENT_UNITS`] in
/// flight, waiting for all of them. Results come back in completion order.
pub async fn fan_out<T, R, F, Fut>(units: impl IntoIterator<Item = T>, work: F) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(units)
        .map(work)
        .buffer_unordered(MAX_CONCURRENT_UNITS)
        .collect()
        .await
}
