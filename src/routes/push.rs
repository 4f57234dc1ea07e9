// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagnostic push endpoint.

use crate::services::push::{success_count, Notification};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct TestPushParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/test-push", get(test_push))
}

pub fn test_notification(user_id: &str) -> Notification {
    Notification::alert(
        "🚀 Test Push",
        format!("Test push notification for user {}", user_id),
    )
}

/// Send a test notification to every device of `userId`.
async fn test_push(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestPushParams>,
) -> (StatusCode, String) {
    let Some(user_id) = params
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return (StatusCode::BAD_REQUEST, "Missing userId".to_string());
    };

    let tokens = match state.tokens.live_tokens(&user_id).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Test push token lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error sending push: {}", e),
            );
        }
    };
    if tokens.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            format!("No tokens found for user {}", user_id),
        );
    }

    match state
        .transport
        .send_multicast(&tokens, &test_notification(&user_id))
        .await
    {
        Ok(results) => {
            let delivered = success_count(&results);
            tracing::info!(user_id = %user_id, delivered, tokens = tokens.len(), "Test push sent");
            (
                StatusCode::OK,
                format!("Sent to {} of {} devices", delivered, tokens.len()),
            )
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Test push failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error sending push: {}", e),
            )
        }
    }
}
