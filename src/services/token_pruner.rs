// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dead token pruning.
//!
//! Every registered token is pinged with a silent push. Only tokens the push
//! service rejects as unregistered or invalid are deleted. An outage, a quota
//! error or a call that fails as a whole says nothing about the token, so the
//! token is kept and pinged again next pass.

use crate::db::{CollectionPath, DocumentStore, Filter};
use crate::error::AppError;
use crate::models::User;
use crate::services::fanout::{fan_out, JobReport, UnitOutcome};
use crate::services::push::{Notification, PushTransport};
use crate::services::tokens::TokenRegistry;
use std::sync::Arc;

pub const JOB_NAME: &str = "token-prune";

/// Short, log-safe label for a token.
fn token_label(user_id: &str, token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("users/{}/tokens/{}…", user_id, prefix)
}

pub struct TokenPruner {
    store: Arc<dyn DocumentStore>,
    tokens: TokenRegistry,
    transport: Arc<dyn PushTransport>,
}

impl TokenPruner {
    pub fn new(store: Arc<dyn DocumentStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            tokens: TokenRegistry::new(Arc::clone(&store)),
            store,
            transport,
        }
    }

    /// One full pass over every user's tokens.
    pub async fn run(&self, now_ms: i64) -> JobReport {
        let mut report = JobReport::new(JOB_NAME, now_ms);

        let users = match self.store.query(&CollectionPath::users(), &Filter::All).await {
            Ok(docs) => docs,
            Err(e) => {
                report.record("users", Err(e));
                return report.finish();
            }
        };

        // Enumerate tokens per user. One user's failure leaves the rest alone.
        let listings = fan_out(users, |doc| async move {
            match User::from_document(&doc) {
                Ok(user) => tracing::debug!(user_id = %user.id, role = ?user.role, "Listing tokens"),
                Err(e) => tracing::debug!(user_id = %doc.id, error = %e, "Listing tokens of unreadable user"),
            }
            let tokens = self.tokens.live_tokens(&doc.id).await;
            (doc.id, tokens)
        })
        .await;

        let mut targets = Vec::new();
        for (user_id, tokens) in listings {
            match tokens {
                Ok(tokens) => targets.extend(tokens.into_iter().map(|t| (user_id.clone(), t))),
                Err(e) => report.record(&format!("users/{}", user_id), Err(e)),
            }
        }

        let results = fan_out(targets, |(user_id, token)| async move {
            let result = self.check_token(&user_id, &token).await;
            (token_label(&user_id, &token), result)
        })
        .await;

        for (label, result) in results {
            report.record(&label, result);
        }
        report.finish()
    }

    /// Ping one token and delete it if the transport rejects it.
    ///
    /// `Acted` means the token was pruned.
    pub async fn check_token(&self, user_id: &str, token: &str) -> Result<UnitOutcome, AppError> {
        let results = self
            .transport
            .send_multicast(&[token.to_string()], &Notification::Ping)
            .await?;

        let verdict = results.into_iter().find(|r| r.token == token);
        match verdict {
            Some(result) if result.success => Ok(UnitOutcome::Skipped),
            Some(result) if result.rejected => {
                self.tokens.delete(user_id, token).await?;
                tracing::info!(
                    user_id,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Pruned dead token"
                );
                Ok(UnitOutcome::Acted)
            }
            Some(result) => Err(AppError::Push(format!(
                "ping not delivered, token kept: {}",
                result.error.as_deref().unwrap_or("unknown")
            ))),
            None => Err(AppError::Push(
                "transport returned no result for pinged token".to_string(),
            )),
        }
    }
}
