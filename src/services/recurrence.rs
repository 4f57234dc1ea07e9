// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recurring task spawner.
//!
//! A template (`recurring = true`) spawns a fresh occurrence once it is
//! `done` and its interval has elapsed since the last occurrence. The child
//! is created first and the template's `lastOccurrence` advanced only after
//! the create succeeded:
//! - create fails: pointer untouched, the template is retried next pass
//! - advance fails: the next pass spawns one duplicate child

use crate::db::{CollectionPath, Document, DocumentStore, Fields, Filter, FilterValue};
use crate::error::AppError;
use crate::models::task::field;
use crate::models::{Task, TaskStatus};
use crate::services::fanout::{fan_out, JobReport, UnitOutcome};
use crate::time_utils::DAY_MS;
use serde_json::json;
use std::sync::Arc;

pub const JOB_NAME: &str = "recurring-spawn";

/// Whether a template should spawn now, and if not why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnDecision {
    Due { next_due_ms: i64 },
    NotYet { next_due_ms: i64 },
    /// Recurrence is gated on completion, not elapsed time
    NotDone,
    /// Interval missing, non-numeric or not positive
    BadInterval,
    /// Neither `lastOccurrence` nor a creation time
    NoBaseline,
    NotTemplate,
}

/// Pure schedule check for one template at `now_ms`.
pub fn spawn_decision(task: &Task, now_ms: i64) -> SpawnDecision {
    if !task.is_template() {
        return SpawnDecision::NotTemplate;
    }
    if task.status != TaskStatus::Done {
        return SpawnDecision::NotDone;
    }
    let interval_days = match task.recurring_interval {
        Some(days) if days > 0 => days,
        _ => return SpawnDecision::BadInterval,
    };
    let Some(last_ms) = task.recurrence_baseline() else {
        return SpawnDecision::NoBaseline;
    };

    let next_due_ms = last_ms.saturating_add(interval_days.saturating_mul(DAY_MS));
    if now_ms >= next_due_ms {
        SpawnDecision::Due { next_due_ms }
    } else {
        SpawnDecision::NotYet { next_due_ms }
    }
}

pub struct RecurrenceSpawner {
    store: Arc<dyn DocumentStore>,
}

impl RecurrenceSpawner {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// One full pass over all templates.
    pub async fn run(&self, now_ms: i64) -> JobReport {
        let mut report = JobReport::new(JOB_NAME, now_ms);

        let templates = match self
            .store
            .query(
                &CollectionPath::tasks(),
                &Filter::eq(field::RECURRING, FilterValue::Bool(true)),
            )
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                report.record("tasks", Err(e));
                return report.finish();
            }
        };

        let results = fan_out(templates, |doc| async move {
            let result = self.process(&doc, now_ms).await;
            (doc.id, result)
        })
        .await;

        for (template_id, result) in results {
            report.record(&template_id, result);
        }
        report.finish()
    }

    async fn process(&self, doc: &Document, now_ms: i64) -> Result<UnitOutcome, AppError> {
        let template = Task::from_document(doc)?;

        let decision = spawn_decision(&template, now_ms);
        match decision {
            SpawnDecision::Due { next_due_ms } => {
                let child_id = self.spawn(&template, now_ms).await?;
                tracing::info!(
                    template_id = %template.id,
                    child_id = %child_id,
                    next_due_ms,
                    "Spawned recurring task occurrence"
                );
                Ok(UnitOutcome::Acted)
            }
            SpawnDecision::BadInterval | SpawnDecision::NoBaseline => {
                tracing::warn!(
                    template_id = %template.id,
                    ?decision,
                    "Skipping misconfigured recurring template"
                );
                Ok(UnitOutcome::Skipped)
            }
            _ => {
                tracing::debug!(template_id = %template.id, ?decision, "Template not due");
                Ok(UnitOutcome::Skipped)
            }
        }
    }

    /// Create the occurrence, then advance the template's pointer.
    ///
    /// Returns the new child's ID.
    pub async fn spawn(&self, template: &Task, now_ms: i64) -> Result<String, AppError> {
        let tasks = CollectionPath::tasks();
        let child = template.spawn_occurrence(now_ms);
        let child_id = self.store.create(&tasks, None, child.to_fields()?).await?;

        let mut advance = Fields::new();
        advance.insert(field::LAST_OCCURRENCE.to_string(), json!(now_ms));
        if let Err(e) = self.store.update(&tasks, &template.id, advance).await {
            tracing::error!(
                template_id = %template.id,
                child_id = %child_id,
                error = %e,
                "Spawned occurrence but could not advance template; next pass will duplicate it"
            );
            return Err(e);
        }
        Ok(child_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATED: i64 = 1_760_000_000_000;

    fn template(interval: Option<i64>) -> Task {
        let mut task = Task::new("Water plants", Some("u1".into()), CREATED);
        task.recurring = true;
        task.recurring_interval = interval;
        task.status = TaskStatus::Done;
        task
    }

    #[test]
    fn test_due_after_interval_from_creation() {
        let task = template(Some(7));
        let due = CREATED + 7 * DAY_MS;

        assert_eq!(
            spawn_decision(&task, due - 1),
            SpawnDecision::NotYet { next_due_ms: due }
        );
        assert_eq!(
            spawn_decision(&task, due),
            SpawnDecision::Due { next_due_ms: due }
        );
    }

    #[test]
    fn test_last_occurrence_overrides_creation() {
        let mut task = template(Some(1));
        task.last_occurrence = Some(CREATED + 10 * DAY_MS);

        assert!(matches!(
            spawn_decision(&task, CREATED + 10 * DAY_MS + 1),
            SpawnDecision::NotYet { .. }
        ));
    }

    #[test]
    fn test_not_done_is_never_spawned() {
        let mut task = template(Some(1));
        task.status = TaskStatus::InProgress;
        assert_eq!(
            spawn_decision(&task, CREATED + 365 * DAY_MS),
            SpawnDecision::NotDone
        );
    }

    #[test]
    fn test_bad_intervals() {
        for interval in [None, Some(0), Some(-3)] {
            assert_eq!(
                spawn_decision(&template(interval), CREATED + 365 * DAY_MS),
                SpawnDecision::BadInterval
            );
        }
    }

    #[test]
    fn test_missing_baseline() {
        let mut task = template(Some(1));
        task.created_at = None;
        assert_eq!(spawn_decision(&task, i64::MAX), SpawnDecision::NoBaseline);
    }

    #[test]
    fn test_non_template_ignored() {
        let mut task = template(Some(1));
        task.recurring = false;
        assert_eq!(
            spawn_decision(&task, CREATED + DAY_MS),
            SpawnDecision::NotTemplate
        );
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let task = template(Some(i64::MAX));
        assert!(matches!(
            spawn_decision(&task, CREATED),
            SpawnDecision::NotYet { .. }
        ));
    }
}
