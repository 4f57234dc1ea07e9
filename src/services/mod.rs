// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod assignment;
pub mod fanout;
pub mod push;
pub mod recurrence;
pub mod task_control;
pub mod timer_watch;
pub mod token_pruner;
pub mod tokens;

pub use assignment::{AssignmentNotifier, AssignmentOutcome};
pub use fanout::{JobReport, UnitOutcome};
pub use push::{
    DeliveryResult, FcmTransport, Notification, PushTransport, RecordingTransport,
};
pub use recurrence::RecurrenceSpawner;
pub use task_control::TaskControl;
pub use timer_watch::TimerWatcher;
pub use token_pruner::TokenPruner;
pub use tokens::TokenRegistry;
