// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process job scheduler.
//!
//! The timer watcher and token pruner run on fixed intervals; the recurring
//! spawner runs once a day at a configured UTC time. Every tick runs in its
//! own task under the configured time budget, so a slow pass may overlap the
//! next one. A pass that runs out of budget is dropped and whatever it did
//! not reach is picked up next time.

use crate::services::JobReport;
use crate::time_utils::{format_utc_rfc3339, next_daily_run, now_ms};
use crate::AppState;
use chrono::{NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The polling jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    TimerWatch,
    RecurringSpawn,
    TokenPrune,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Job::TimerWatch => crate::services::timer_watch::JOB_NAME,
            Job::RecurringSpawn => crate::services::recurrence::JOB_NAME,
            Job::TokenPrune => crate::services::token_pruner::JOB_NAME,
        }
    }

    /// Run one pass to completion.
    pub async fn run(self, state: &AppState, now_ms: i64) -> JobReport {
        match self {
            Job::TimerWatch => state.timer_watcher.run(now_ms).await,
            Job::RecurringSpawn => state.recurrence_spawner.run(now_ms).await,
            Job::TokenPrune => state.token_pruner.run(now_ms).await,
        }
    }
}

/// Run one pass at the current time, abandoning it once the budget is spent.
///
/// Returns `None` if the pass timed out.
pub async fn run_with_budget(state: &AppState, job: Job) -> Option<JobReport> {
    let budget = state.config.job_time_budget;
    match tokio::time::timeout(budget, job.run(state, now_ms())).await {
        Ok(report) => Some(report),
        Err(_) => {
            tracing::warn!(
                job = job.name(),
                budget_secs = budget.as_secs(),
                "Job pass exceeded its time budget and was abandoned"
            );
            None
        }
    }
}

/// Start all job loops in the background.
pub fn start(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let config = &state.config;
    tracing::info!(
        watcher_secs = config.watcher_interval.as_secs(),
        pruner_secs = config.pruner_interval.as_secs(),
        spawner_at = %config.spawner_run_at,
        "Starting job scheduler"
    );

    vec![
        tokio::spawn(every(
            Arc::clone(&state),
            Job::TimerWatch,
            config.watcher_interval,
        )),
        tokio::spawn(every(
            Arc::clone(&state),
            Job::TokenPrune,
            config.pruner_interval,
        )),
        tokio::spawn(daily(
            Arc::clone(&state),
            Job::RecurringSpawn,
            config.spawner_run_at,
        )),
    ]
}

fn spawn_pass(state: &Arc<AppState>, job: Job) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        run_with_budget(&state, job).await;
    });
}

async fn every(state: Arc<AppState>, job: Job, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        spawn_pass(&state, job);
    }
}

async fn daily(state: Arc<AppState>, job: Job, at: NaiveTime) {
    loop {
        let now = Utc::now();
        let next = next_daily_run(now, at);
        tracing::info!(
            job = job.name(),
            next_run = %format_utc_rfc3339(next),
            "Scheduled daily job"
        );
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
        spawn_pass(&state, job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::services::RecordingTransport;

    fn state() -> AppState {
        AppState::new(
            Config::test_default(),
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingTransport::new()),
        )
    }

    #[test]
    fn test_job_names() {
        assert_eq!(Job::TimerWatch.name(), "timer-watch");
        assert_eq!(Job::RecurringSpawn.name(), "recurring-spawn");
        assert_eq!(Job::TokenPrune.name(), "token-prune");
    }

    #[tokio::test]
    async fn test_run_with_budget_on_empty_store() {
        let state = state();
        for job in [Job::TimerWatch, Job::RecurringSpawn, Job::TokenPrune] {
            let report = run_with_budget(&state, job).await.unwrap();
            assert_eq!(report.job, job.name());
            assert!(report.is_complete_success());
            assert_eq!(report.acted + report.skipped, 0);
        }
    }
}
