// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task model for storage, timers and recurrence.

use crate::db::{to_fields, Document, Fields};
use crate::error::AppError;
use crate::models::{empty_as_none, null_as_default};
use crate::time_utils::{
    deserialize_opt_millis, deserialize_opt_whole, format_occurrence_date, DAY_MS, MINUTE_MS,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Shortest countdown a user may set.
pub const MIN_TIMER_MS: i64 = MINUTE_MS;
/// Longest countdown a user may set (30 days).
pub const MAX_TIMER_MS: i64 = 30 * DAY_MS;

/// Stored field names used in partial updates.
pub mod field {
    pub const TIMER_START: &str = "timerStart";
    pub const TIMER_DURATION: &str = "timerDuration";
    pub const NOTIFIED_15MIN: &str = "notified15min";
    pub const RECURRING: &str = "recurring";
    pub const LAST_OCCURRENCE: &str = "lastOccurrence";
    pub const SUB_TASKS: &str = "subTasks";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    OnHold,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A checklist item inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_progress: bool,
}

impl SubTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Cycle pending → in progress → done → pending.
    pub fn advance(&mut self) {
        (self.in_progress, self.done) = match (self.in_progress, self.done) {
            (false, false) => (true, false),
            (true, false) => (false, true),
            _ => (false, false),
        };
    }

    /// Same title, progress cleared.
    pub fn reset(&self) -> Self {
        Self::new(self.title.clone())
    }
}

/// Where a task's countdown stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    NoTimer,
    /// Running, warning not yet sent
    Active,
    /// Running, warning already sent
    Warned,
    /// Countdown elapsed. Terminal, nothing further is automated.
    Expired,
}

/// Stored task document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Document ID (not stored as a field)
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    /// Assignee user ID
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assigned_to: Option<String>,
    /// Creator user ID
    #[serde(default, deserialize_with = "empty_as_none")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Countdown start (ms since epoch)
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub timer_start: Option<i64>,
    /// Countdown length (ms)
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub timer_duration: Option<i64>,
    /// Set once the pre-expiry warning for the current timer has been sent
    #[serde(
        rename = "notified15min",
        default,
        deserialize_with = "null_as_default"
    )]
    pub notified_15min: bool,
    /// Template flag: recurring tasks spawn non-recurring occurrences
    #[serde(default, deserialize_with = "null_as_default")]
    pub recurring: bool,
    /// Days between occurrences
    #[serde(default, deserialize_with = "deserialize_opt_whole")]
    pub recurring_interval: Option<i64>,
    /// When the last occurrence was spawned (ms since epoch)
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub last_occurrence: Option<i64>,
    /// Creation time (ms since epoch)
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub created_at: Option<i64>,
}

impl Task {
    /// A fresh `todo` task with default priority.
    pub fn new(title: impl Into<String>, created_by: Option<String>, now_ms: i64) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assigned_to: created_by.clone(),
            created_by,
            sub_tasks: Vec::new(),
            comment: None,
            timer_start: None,
            timer_duration: None,
            notified_15min: false,
            recurring: false,
            recurring_interval: None,
            last_occurrence: None,
            created_at: Some(now_ms),
        }
    }

    /// Decode a stored document, rejecting unknown enum values.
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let mut task: Task = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| AppError::InvalidDocument {
                id: doc.id.clone(),
                reason: e.to_string(),
            })?;
        task.id = doc.id.clone();
        Ok(task)
    }

    /// Encode for storage (the ID is not a field).
    pub fn to_fields(&self) -> Result<Fields, AppError> {
        let value = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Task encode error: {}", e)))?;
        Ok(to_fields(value))
    }

    /// User whose devices receive timer warnings: the assignee, else the creator.
    pub fn owner(&self) -> Option<&str> {
        self.assigned_to.as_deref().or(self.created_by.as_deref())
    }

    pub fn is_template(&self) -> bool {
        self.recurring
    }

    /// Milliseconds until the countdown expires, negative once it has.
    ///
    /// Stored values too large to add up read as no timer.
    pub fn time_left_ms(&self, now_ms: i64) -> Option<i64> {
        let (start, duration) = (self.timer_start?, self.timer_duration?);
        start.checked_add(duration)?.checked_sub(now_ms)
    }

    pub fn timer_phase(&self, now_ms: i64) -> TimerPhase {
        match self.time_left_ms(now_ms) {
            None => TimerPhase::NoTimer,
            Some(left) if left <= 0 => TimerPhase::Expired,
            Some(_) if self.notified_15min => TimerPhase::Warned,
            Some(_) => TimerPhase::Active,
        }
    }

    /// Start a new countdown. Always re-arms the pre-expiry warning.
    ///
    /// Returns the partial update to persist.
    pub fn set_timer(&mut self, now_ms: i64, duration_ms: i64) -> Result<Fields, AppError> {
        if !(MIN_TIMER_MS..=MAX_TIMER_MS).contains(&duration_ms) {
            return Err(AppError::BadRequest(format!(
                "Timer duration must be between 1 minute and 30 days, got {} ms",
                duration_ms
            )));
        }

        self.timer_start = Some(now_ms);
        self.timer_duration = Some(duration_ms);
        self.notified_15min = false;

        let mut patch = Fields::new();
        patch.insert(field::TIMER_START.to_string(), json!(now_ms));
        patch.insert(field::TIMER_DURATION.to_string(), json!(duration_ms));
        patch.insert(field::NOTIFIED_15MIN.to_string(), json!(false));
        Ok(patch)
    }

    /// Drop the countdown, returning the partial update to persist.
    pub fn cancel_timer(&mut self) -> Fields {
        self.timer_start = None;
        self.timer_duration = None;
        self.notified_15min = false;

        let mut patch = Fields::new();
        patch.insert(field::TIMER_START.to_string(), Value::Null);
        patch.insert(field::TIMER_DURATION.to_string(), Value::Null);
        patch.insert(field::NOTIFIED_15MIN.to_string(), json!(false));
        patch
    }

    /// Advance one subtask, returning the partial update to persist.
    pub fn advance_subtask(&mut self, index: usize) -> Result<Fields, AppError> {
        let sub = self
            .sub_tasks
            .get_mut(index)
            .ok_or_else(|| AppError::NotFound(format!("Subtask {} of task {}", index, self.id)))?;
        sub.advance();

        let sub_tasks = serde_json::to_value(&self.sub_tasks)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Subtask encode error: {}", e)))?;
        let mut patch = Fields::new();
        patch.insert(field::SUB_TASKS.to_string(), sub_tasks);
        Ok(patch)
    }

    /// Baseline for the next occurrence: the last spawn, else creation time.
    pub fn recurrence_baseline(&self) -> Option<i64> {
        self.last_occurrence.or(self.created_at)
    }

    /// Build the occurrence a template spawns at `now_ms`.
    ///
    /// The child starts over: `todo`, no timer, subtasks cleared, and never
    /// recurring itself.
    pub fn spawn_occurrence(&self, now_ms: i64) -> Task {
        Task {
            id: String::new(),
            title: format!("{} ({})", self.title, format_occurrence_date(now_ms)),
            status: TaskStatus::Todo,
            priority: self.priority,
            assigned_to: self.assigned_to.clone(),
            created_by: self.created_by.clone(),
            sub_tasks: self.sub_tasks.iter().map(SubTask::reset).collect(),
            comment: self.comment.clone(),
            timer_start: None,
            timer_duration: None,
            notified_15min: false,
            recurring: false,
            recurring_interval: None,
            last_occurrence: None,
            created_at: Some(now_ms),
        }
    }
}
