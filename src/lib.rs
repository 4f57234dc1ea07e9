// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Taskbeacon: notification and recurrence engine for a task tracker.
//!
//! Background jobs warn users before task timers run out, notify new
//! assignees, spawn occurrences of recurring tasks and prune dead push
//! tokens. Jobs run from an in-process scheduler or via HTTP triggers.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{
    AssignmentNotifier, PushTransport, RecurrenceSpawner, TaskControl, TimerWatcher, TokenPruner,
    TokenRegistry,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub transport: Arc<dyn PushTransport>,
    pub tokens: TokenRegistry,
    pub task_control: TaskControl,
    pub timer_watcher: TimerWatcher,
    pub assignment_notifier: AssignmentNotifier,
    pub recurrence_spawner: RecurrenceSpawner,
    pub token_pruner: TokenPruner,
}

impl AppState {
    /// Wire every job to the given store and transport.
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            tokens: TokenRegistry::new(Arc::clone(&store)),
            task_control: TaskControl::new(Arc::clone(&store)),
            timer_watcher: TimerWatcher::new(Arc::clone(&store), Arc::clone(&transport)),
            assignment_notifier: AssignmentNotifier::new(
                Arc::clone(&store),
                Arc::clone(&transport),
            ),
            recurrence_spawner: RecurrenceSpawner::new(Arc::clone(&store)),
            token_pruner: TokenPruner::new(Arc::clone(&store), Arc::clone(&transport)),
            config,
            store,
            transport,
        }
    }
}
