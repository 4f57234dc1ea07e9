// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (trigger authentication, security headers).

pub mod jobs_auth;
pub mod security;

pub use jobs_auth::require_jobs_auth;
