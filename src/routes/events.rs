// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task write events from the store's change feed.

use crate::db::Fields;
use crate::services::AssignmentOutcome;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Before and after images of one task write.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWrittenEvent {
    pub task_id: String,
    /// Absent when the task was created
    #[serde(default)]
    pub before: Option<Value>,
    /// Absent when the task was deleted
    #[serde(default)]
    pub after: Option<Value>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events/task-written", post(task_written))
}

fn image(value: Option<Value>) -> Option<Fields> {
    match value {
        Some(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

/// Notification is a side effect of the write, so this always answers 200
/// once the event parses.
async fn task_written(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TaskWrittenEvent>,
) -> Json<AssignmentOutcome> {
    let before = image(event.before);
    let after = image(event.after);

    let outcome = state
        .assignment_notifier
        .handle(&event.task_id, before.as_ref(), after.as_ref())
        .await;

    tracing::debug!(task_id = %event.task_id, ?outcome, "Handled task write");
    Json(outcome)
}
