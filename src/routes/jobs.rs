// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job trigger routes for an external scheduler.
//!
//! Each route runs one pass of a polling job and returns its report. They
//! sit behind the trigger-token middleware.

use crate::error::{AppError, Result};
use crate::scheduler::{run_with_budget, Job};
use crate::services::JobReport;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/timer-watch", post(timer_watch))
        .route("/jobs/recurring-spawn", post(recurring_spawn))
        .route("/jobs/token-prune", post(token_prune))
}

async fn timer_watch(State(state): State<Arc<AppState>>) -> Result<Json<JobReport>> {
    trigger(&state, Job::TimerWatch).await
}

async fn recurring_spawn(State(state): State<Arc<AppState>>) -> Result<Json<JobReport>> {
    trigger(&state, Job::RecurringSpawn).await
}

async fn token_prune(State(state): State<Arc<AppState>>) -> Result<Json<JobReport>> {
    trigger(&state, Job::TokenPrune).await
}

async fn trigger(state: &AppState, job: Job) -> Result<Json<JobReport>> {
    tracing::info!(job = job.name(), "Job triggered over HTTP");
    run_with_budget(state, job).await.map(Json).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "{} pass exceeded its time budget",
            job.name()
        ))
    })
}
