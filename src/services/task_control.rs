// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timer and subtask edits on stored tasks.
//!
//! Each edit loads the task, applies the change in the model and merges
//! only the touched fields back, so concurrent edits to other fields
//! survive.

use crate::db::{CollectionPath, DocumentStore, Fields};
use crate::error::AppError;
use crate::models::Task;
use std::sync::Arc;

pub struct TaskControl {
    store: Arc<dyn DocumentStore>,
}

impl TaskControl {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn load(&self, task_id: &str) -> Result<Task, AppError> {
        let doc = self
            .store
            .get(&CollectionPath::tasks(), task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {}", task_id)))?;
        Task::from_document(&doc)
    }

    async fn persist(&self, task_id: &str, patch: Fields) -> Result<(), AppError> {
        self.store
            .update(&CollectionPath::tasks(), task_id, patch)
            .await
    }

    /// Start a countdown of `duration_ms` from `now_ms`, re-arming the
    /// pre-expiry warning.
    pub async fn set_timer(
        &self,
        task_id: &str,
        now_ms: i64,
        duration_ms: i64,
    ) -> Result<Task, AppError> {
        let mut task = self.load(task_id).await?;
        let patch = task.set_timer(now_ms, duration_ms)?;
        self.persist(task_id, patch).await?;
        tracing::info!(task_id, duration_ms, "Timer started");
        Ok(task)
    }

    pub async fn cancel_timer(&self, task_id: &str) -> Result<Task, AppError> {
        let mut task = self.load(task_id).await?;
        let patch = task.cancel_timer();
        self.persist(task_id, patch).await?;
        tracing::info!(task_id, "Timer cancelled");
        Ok(task)
    }

    /// Move subtask `index` one step along its status cycle.
    pub async fn advance_subtask(&self, task_id: &str, index: usize) -> Result<Task, AppError> {
        let mut task = self.load(task_id).await?;
        let patch = task.advance_subtask(index)?;
        self.persist(task_id, patch).await?;
        tracing::debug!(task_id, index, "Subtask advanced");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{to_fields, MemoryStore};
    use crate::time_utils::MINUTE_MS;
    use serde_json::json;

    const NOW: i64 = 1_760_000_000_000;

    fn control() -> (TaskControl, MemoryStore) {
        let store = MemoryStore::new();
        (TaskControl::new(Arc::new(store.clone())), store)
    }

    fn seed(store: &MemoryStore, value: serde_json::Value) {
        store.insert(&CollectionPath::tasks(), "t1", to_fields(value));
    }

    #[tokio::test]
    async fn test_set_timer_rearms_and_keeps_other_fields() {
        let (control, store) = control();
        seed(&store, json!({"title": "Inventory", "notified15min": true, "extra": 7}));

        let task = control.set_timer("t1", NOW, 30 * MINUTE_MS).await.unwrap();

        assert_eq!(task.timer_start, Some(NOW));
        let stored = store.peek(&CollectionPath::tasks(), "t1").unwrap();
        assert_eq!(stored["timerDuration"], 30 * MINUTE_MS);
        assert_eq!(stored["notified15min"], false);
        assert_eq!(stored["extra"], 7);
    }

    #[tokio::test]
    async fn test_invalid_duration_writes_nothing() {
        let (control, store) = control();
        seed(&store, json!({"title": "Inventory"}));

        let result = control.set_timer("t1", NOW, 0).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(!store.peek(&CollectionPath::tasks(), "t1").unwrap().contains_key("timerStart"));
    }

    #[tokio::test]
    async fn test_cancel_clears_timer() {
        let (control, store) = control();
        seed(&store, json!({"timerStart": NOW, "timerDuration": MINUTE_MS, "notified15min": true}));

        let task = control.cancel_timer("t1").await.unwrap();

        assert_eq!(task.timer_start, None);
        let stored = store.peek(&CollectionPath::tasks(), "t1").unwrap();
        assert_eq!(stored["timerStart"], serde_json::Value::Null);
        assert_eq!(stored["notified15min"], false);
    }

    #[tokio::test]
    async fn test_advance_subtask_and_missing_targets() {
        let (control, store) = control();
        seed(&store, json!({"subTasks": [{"title": "a", "done": false, "inProgress": false}]}));

        control.advance_subtask("t1", 0).await.unwrap();
        let stored = store.peek(&CollectionPath::tasks(), "t1").unwrap();
        assert_eq!(stored["subTasks"][0]["inProgress"], true);
        assert_eq!(stored["subTasks"][0]["done"], false);

        let missing_index = control.advance_subtask("t1", 3).await;
        assert!(matches!(missing_index, Err(AppError::NotFound(_))));
        let missing_task = control.cancel_timer("nope").await;
        assert!(matches!(missing_task, Err(AppError::NotFound(_))));
    }
}
