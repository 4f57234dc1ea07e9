// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user registry of push destination tokens.

use crate::db::{CollectionPath, DocumentStore, Filter};
use crate::error::AppError;
use crate::models::DeviceToken;
use std::sync::Arc;

/// Token documents under `users/{uid}/tokens`, keyed by the token string.
#[derive(Clone)]
pub struct TokenRegistry {
    store: Arc<dyn DocumentStore>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Every token registered for `user_id`.
    pub async fn list(&self, user_id: &str) -> Result<Vec<DeviceToken>, AppError> {
        let docs = self
            .store
            .query(&CollectionPath::user_tokens(user_id), &Filter::All)
            .await?;
        Ok(docs.iter().map(DeviceToken::from_document).collect())
    }

    /// Token strings ready to hand to the transport.
    pub async fn live_tokens(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .map(|t| t.token)
            .filter(|t| !t.is_empty())
            .collect())
    }

    pub async fn delete(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        self.store
            .delete(&CollectionPath::user_tokens(user_id), token)
            .await
    }

    /// Register a device token. Registering a known token changes nothing.
    ///
    /// Returns true if the token was newly added.
    pub async fn register(
        &self,
        user_id: &str,
        token: &str,
        user_agent: Option<String>,
        now_ms: i64,
    ) -> Result<bool, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::BadRequest("Token must not be empty".to_string()));
        }

        let collection = CollectionPath::user_tokens(user_id);
        if self.store.get(&collection, token).await?.is_some() {
            tracing::debug!(user_id, "Token already registered");
            return Ok(false);
        }

        let fields = DeviceToken::new(token, now_ms, user_agent).to_fields()?;
        self.store.create(&collection, Some(token), fields).await?;
        tracing::info!(user_id, "Registered device token");
        Ok(true)
    }

    /// Remove a token the user signed out of. Unknown tokens are ignored.
    pub async fn unregister(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        self.delete(user_id, token.trim()).await?;
        tracing::info!(user_id, "Unregistered device token");
        Ok(())
    }
}
