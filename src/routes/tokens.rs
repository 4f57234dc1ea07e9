// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device token registration for trusted callers.

use crate::error::Result;
use crate::time_utils::now_ms;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
    pub token: String,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterTokenResponse {
    pub created: bool,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/{user_id}/tokens", post(register_token))
        .route("/users/{user_id}/tokens/{token}", delete(unregister_token))
}

/// 201 for a new token, 200 when it was already registered.
async fn register_token(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<RegisterTokenRequest>,
) -> Result<(StatusCode, Json<RegisterTokenResponse>)> {
    let created = state
        .tokens
        .register(&user_id, &req.token, req.user_agent, now_ms())
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RegisterTokenResponse { created })))
}

async fn unregister_token(
    State(state): State<Arc<AppState>>,
    Path((user_id, token)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.tokens.unregister(&user_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
