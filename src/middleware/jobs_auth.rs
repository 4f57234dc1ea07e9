// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for trigger routes (`/jobs/*`, `/events/*`).
//!
//! Callers are the external scheduler and the store's change feed. They send
//! `Authorization: Bearer <JOBS_TRIGGER_TOKEN>`.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require the configured trigger token. With no token configured every
/// request is refused.
pub async fn require_jobs_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.jobs_trigger_token.as_deref() else {
        tracing::warn!(
            path = %request.uri().path(),
            "Blocked trigger request: JOBS_TRIGGER_TOKEN is not configured"
        );
        return Err(StatusCode::FORBIDDEN);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let authorized = provided
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));
    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            has_header = provided.is_some(),
            "Blocked trigger request with invalid token"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
