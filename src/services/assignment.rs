// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Assignment change notifications, fired on every task write.
//!
//! The notifier only reads `assignedTo` and `title` from the before and
//! after images, so it works even when other fields would not decode.

use crate::db::{DocumentStore, Fields};
use crate::services::push::{success_count, Notification, PushTransport};
use crate::services::tokens::TokenRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const FALLBACK_TITLE: &str = "New Task";

/// What the notifier did with one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    /// No after-image: the task was deleted
    Deleted,
    /// Assignee empty or unchanged
    NoChange,
    /// New assignee has no registered devices
    NoTokens { user_id: String },
    Notified {
        user_id: String,
        delivered: usize,
        failed: usize,
    },
    /// Token lookup or the transport failed as a whole
    Failed { user_id: String, error: String },
}

fn assignee(image: &Fields) -> Option<&str> {
    image
        .get("assignedTo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The user to notify for a write, if any.
///
/// Only a change to a new non-empty assignee counts: A→B and ∅→B notify B,
/// while A→A and A→∅ notify nobody.
pub fn new_assignee<'a>(before: Option<&Fields>, after: &'a Fields) -> Option<&'a str> {
    let now = assignee(after)?;
    let previous = before.and_then(assignee);
    (previous != Some(now)).then_some(now)
}

pub fn assignment_notification(after: &Fields) -> Notification {
    let title = after
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_TITLE);
    Notification::alert(
        "📌 New Task Assigned",
        format!("You've been assigned: \"{}\"", title),
    )
}

pub struct AssignmentNotifier {
    tokens: TokenRegistry,
    transport: Arc<dyn PushTransport>,
}

impl AssignmentNotifier {
    pub fn new(store: Arc<dyn DocumentStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            tokens: TokenRegistry::new(store),
            transport,
        }
    }

    /// React to one write of task `task_id`. Never fails: delivery problems
    /// are logged and reported in the outcome.
    pub async fn handle(
        &self,
        task_id: &str,
        before: Option<&Fields>,
        after: Option<&Fields>,
    ) -> AssignmentOutcome {
        let Some(after) = after else {
            return AssignmentOutcome::Deleted;
        };
        let Some(user_id) = new_assignee(before, after) else {
            return AssignmentOutcome::NoChange;
        };
        let user_id = user_id.to_string();

        let tokens = match self.tokens.live_tokens(&user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(task_id, user_id = %user_id, error = %e, "Could not load assignee tokens");
                return AssignmentOutcome::Failed {
                    user_id,
                    error: e.to_string(),
                };
            }
        };
        if tokens.is_empty() {
            tracing::debug!(task_id, user_id = %user_id, "Assignee has no live tokens");
            return AssignmentOutcome::NoTokens { user_id };
        }

        match self
            .transport
            .send_multicast(&tokens, &assignment_notification(after))
            .await
        {
            Ok(results) => {
                let delivered = success_count(&results);
                tracing::info!(
                    task_id,
                    user_id = %user_id,
                    delivered,
                    tokens = tokens.len(),
                    "Sent assignment notification"
                );
                AssignmentOutcome::Notified {
                    user_id,
                    delivered,
                    failed: results.len() - delivered,
                }
            }
            Err(e) => {
                tracing::warn!(task_id, user_id = %user_id, error = %e, "Assignment notification failed");
                AssignmentOutcome::Failed {
                    user_id,
                    error: e.to_string(),
                }
            }
        }
    }
}
