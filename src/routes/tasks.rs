// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task timer and subtask edits for trusted callers.

use crate::error::Result;
use crate::models::Task;
use crate::time_utils::now_ms;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTimerRequest {
    pub duration_ms: i64,
}

/// A task as returned by the edit routes.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    #[serde(flatten)]
    pub task: Task,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.clone(),
            task,
        }
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/{task_id}/timer", post(set_timer).delete(cancel_timer))
        .route(
            "/tasks/{task_id}/subtasks/{index}/advance",
            post(advance_subtask),
        )
}

async fn set_timer(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(req): Json<SetTimerRequest>,
) -> Result<Json<TaskView>> {
    let task = state
        .task_control
        .set_timer(&task_id, now_ms(), req.duration_ms)
        .await?;
    Ok(Json(task.into()))
}

async fn cancel_timer(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>> {
    let task = state.task_control.cancel_timer(&task_id).await?;
    Ok(Json(task.into()))
}

async fn advance_subtask(
    State(state): State<Arc<AppState>>,
    Path((task_id, index)): Path<(String, usize)>,
) -> Result<Json<TaskView>> {
    let task = state.task_control.advance_subtask(&task_id, index).await?;
    Ok(Json(task.into()))
}
