// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pre-expiry timer warnings.
//!
//! Each pass scans every task and warns the owner of any countdown that has
//! entered the detection window. The warning is fenced by `notified15min`:
//! 1. check: [`warning_due`] (pure)
//! 2. send: [`TimerWatcher::send_warning`]
//! 3. persist: [`TimerWatcher::mark_notified`]
//!
//! Send and persist are separate writes. If the process dies between them
//! the next pass sends one duplicate warning and then persists the flag.
//! The flag is only written while `timerStart` still holds the value the
//! pass read, so a countdown restarted mid-pass keeps its own warning.

use crate::db::{CollectionPath, Document, DocumentStore, Fields, Filter};
use crate::error::AppError;
use crate::models::task::field;
use crate::models::Task;
use crate::services::fanout::{fan_out, JobReport, UnitOutcome};
use crate::services::push::{success_count, Notification, PushTransport};
use crate::services::tokens::TokenRegistry;
use crate::time_utils::MINUTE_MS;
use serde_json::{json, Value};
use std::sync::Arc;

pub const JOB_NAME: &str = "timer-watch";

/// Warn when strictly less than this much time is left...
pub const WINDOW_UPPER_MS: i64 = 15 * MINUTE_MS;
/// ...and strictly more than this. The window is wider than the polling
/// interval so no countdown slips through between passes.
pub const WINDOW_LOWER_MS: i64 = 13 * MINUTE_MS;

/// True if `task` should receive its pre-expiry warning at `now_ms`.
pub fn warning_due(task: &Task, now_ms: i64) -> bool {
    if task.notified_15min {
        return false;
    }
    task.time_left_ms(now_ms)
        .is_some_and(|left| left > WINDOW_LOWER_MS && left < WINDOW_UPPER_MS)
}

pub fn warning_notification(task: &Task) -> Notification {
    Notification::alert(
        "⏰ 15 Minutes Left!",
        format!("Your task \"{}\" is running out of time.", task.title),
    )
}

/// Result of the send step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningDelivery {
    pub tokens: usize,
    pub delivered: usize,
}

pub struct TimerWatcher {
    store: Arc<dyn DocumentStore>,
    tokens: TokenRegistry,
    transport: Arc<dyn PushTransport>,
}

impl TimerWatcher {
    pub fn new(store: Arc<dyn DocumentStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            tokens: TokenRegistry::new(Arc::clone(&store)),
            store,
            transport,
        }
    }

    /// One full pass over all tasks.
    pub async fn run(&self, now_ms: i64) -> JobReport {
        let mut report = JobReport::new(JOB_NAME, now_ms);

        let docs = match self.store.query(&CollectionPath::tasks(), &Filter::All).await {
            Ok(docs) => docs,
            Err(e) => {
                report.record("tasks", Err(e));
                return report.finish();
            }
        };

        let results = fan_out(docs, |doc| async move {
            let result = self.process(&doc, now_ms).await;
            (doc.id, result)
        })
        .await;

        for (task_id, result) in results {
            report.record(&task_id, result);
        }
        report.finish()
    }

    async fn process(&self, doc: &Document, now_ms: i64) -> Result<UnitOutcome, AppError> {
        let task = Task::from_document(doc)?;
        if !warning_due(&task, now_ms) {
            return Ok(UnitOutcome::Skipped);
        }

        let delivery = self.send_warning(&task).await?;
        if delivery.tokens == 0 {
            // Retried every pass until the owner registers a device.
            tracing::debug!(task_id = %task.id, "No live tokens for timer warning");
            return Ok(UnitOutcome::Skipped);
        }
        if delivery.delivered == 0 {
            return Err(AppError::Push(format!(
                "timer warning rejected by all {} tokens",
                delivery.tokens
            )));
        }

        let timer_start = doc.get(field::TIMER_START).unwrap_or(&Value::Null);
        if !self.mark_notified(&task.id, timer_start).await? {
            tracing::info!(task_id = %task.id, "Timer changed during pass; flag not written");
            return Ok(UnitOutcome::Acted);
        }
        tracing::info!(
            task_id = %task.id,
            delivered = delivery.delivered,
            tokens = delivery.tokens,
            "Sent timer warning"
        );
        Ok(UnitOutcome::Acted)
    }

    /// Send the warning to every live token of the task's owner.
    ///
    /// A task with no owner is treated like an owner with no tokens.
    pub async fn send_warning(&self, task: &Task) -> Result<WarningDelivery, AppError> {
        let Some(owner) = task.owner() else {
            return Ok(WarningDelivery {
                tokens: 0,
                delivered: 0,
            });
        };

        let tokens = self.tokens.live_tokens(owner).await?;
        if tokens.is_empty() {
            return Ok(WarningDelivery {
                tokens: 0,
                delivered: 0,
            });
        }

        let results = self
            .transport
            .send_multicast(&tokens, &warning_notification(task))
            .await?;

        for failed in results.iter().filter(|r| !r.success) {
            tracing::debug!(
                task_id = %task.id,
                user_id = owner,
                error = failed.error.as_deref().unwrap_or("unknown"),
                "Timer warning not delivered to one token"
            );
        }

        Ok(WarningDelivery {
            tokens: tokens.len(),
            delivered: success_count(&results),
        })
    }

    /// Record that the warning for the countdown started at `timer_start`
    /// went out. Returns `false` if the task is gone or its timer was
    /// restarted since it was read.
    pub async fn mark_notified(&self, task_id: &str, timer_start: &Value) -> Result<bool, AppError> {
        let mut patch = Fields::new();
        patch.insert(field::NOTIFIED_15MIN.to_string(), json!(true));
        self.store
            .update_if(&CollectionPath::tasks(), task_id, field::TIMER_START, timer_start, patch)
            .await
    }
}
