// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timer watcher passes against the in-memory store.

use serde_json::json;
use std::sync::Arc;
use taskbeacon::db::{CollectionPath, Document, MemoryStore};
use taskbeacon::models::Task;
use taskbeacon::services::{Notification, RecordingTransport, TimerWatcher};

mod common;
use common::{seed_task, seed_token, task, DAY, MINUTE, NOW};

const DURATION: i64 = 60 * MINUTE;

fn watcher() -> (TimerWatcher, MemoryStore, RecordingTransport) {
    let store = MemoryStore::new();
    let transport = RecordingTransport::new();
    let watcher = TimerWatcher::new(Arc::new(store.clone()), Arc::new(transport.clone()));
    (watcher, store, transport)
}

fn seed_running(store: &MemoryStore, id: &str, owner: &str) {
    seed_task(
        store,
        id,
        json!({
            "title": "Prepare slides",
            "status": "in-progress",
            "assignedTo": owner,
            "timerStart": NOW,
            "timerDuration": DURATION,
            "notified15min": false,
        }),
    );
}

/// Instant at which `minutes` remain on a timer seeded by `seed_running`.
fn minutes_left(minutes: i64) -> i64 {
    NOW + DURATION - minutes * MINUTE
}

#[tokio::test]
async fn test_end_to_end_warning_to_all_tokens() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");
    seed_token(&store, "u1", "t2");

    let report = watcher.run(minutes_left(14)).await;

    assert_eq!(report.acted, 1);
    assert!(report.is_complete_success());
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens, vec!["t1", "t2"]);
    assert_eq!(
        sent[0].notification,
        Notification::alert(
            "⏰ 15 Minutes Left!",
            "Your task \"Prepare slides\" is running out of time."
        )
    );
    assert_eq!(task(&store, "task-1")["notified15min"], true);
}

#[tokio::test]
async fn test_outside_window_sends_nothing() {
    for now in [minutes_left(20), minutes_left(1), minutes_left(-30)] {
        let (watcher, store, transport) = watcher();
        seed_running(&store, "task-1", "u1");
        seed_token(&store, "u1", "t1");

        let report = watcher.run(now).await;

        assert_eq!(report.acted, 0);
        assert!(transport.sent().is_empty());
        assert_eq!(task(&store, "task-1")["notified15min"], false);
    }
}

#[tokio::test]
async fn test_second_pass_in_window_is_silent() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");

    watcher.run(minutes_left(14)).await;
    let second = watcher.run(minutes_left(14)).await;

    assert_eq!(second.acted, 0);
    assert_eq!(transport.deliveries_to("t1"), 1);
}

#[tokio::test]
async fn test_zero_tokens_stays_unflagged_and_is_retried() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");

    let first = watcher.run(minutes_left(14)).await;
    assert_eq!(first.acted, 0);
    assert!(first.is_complete_success());
    assert_eq!(task(&store, "task-1")["notified15min"], false);

    // A device registered before the window closes still gets the warning.
    seed_token(&store, "u1", "late");
    let second = watcher.run(minutes_left(14) + MINUTE / 2).await;
    assert_eq!(second.acted, 1);
    assert_eq!(transport.deliveries_to("late"), 1);
}

#[tokio::test]
async fn test_crash_between_send_and_persist_duplicates_once() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");

    // Send without persisting, as if the process died in between.
    let snapshot = Task::from_document(&Document::new("task-1", task(&store, "task-1"))).unwrap();
    let delivery = watcher.send_warning(&snapshot).await.unwrap();
    assert_eq!(delivery.delivered, 1);
    assert_eq!(task(&store, "task-1")["notified15min"], false);

    // Recovery pass sends the one duplicate and persists the flag...
    watcher.run(minutes_left(14)).await;
    assert_eq!(transport.deliveries_to("t1"), 2);
    assert_eq!(task(&store, "task-1")["notified15min"], true);

    // ...after which the task is quiet.
    watcher.run(minutes_left(13) - 1).await;
    assert_eq!(transport.deliveries_to("t1"), 2);
}

#[tokio::test]
async fn test_flag_write_failure_is_isolated_and_retried() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_running(&store, "task-2", "u2");
    seed_token(&store, "u1", "t1");
    seed_token(&store, "u2", "t2");
    store.fail_updates_on("task-1");

    let report = watcher.run(minutes_left(14)).await;

    assert!(report.is_partial_failure());
    assert_eq!(report.acted, 1);
    assert_eq!(report.failures[0].unit, "task-1");
    assert_eq!(task(&store, "task-1")["notified15min"], false);
    assert_eq!(task(&store, "task-2")["notified15min"], true);

    store.clear_failures();
    watcher.run(minutes_left(14)).await;
    assert_eq!(task(&store, "task-1")["notified15min"], true);
    assert_eq!(transport.deliveries_to("t2"), 1);
}

#[tokio::test]
async fn test_transport_outage_leaves_flag_unset() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");
    transport.fail_calls(true);

    let report = watcher.run(minutes_left(14)).await;

    assert!(report.is_complete_failure());
    assert_eq!(task(&store, "task-1")["notified15min"], false);
}

#[tokio::test]
async fn test_all_tokens_rejected_leaves_flag_unset() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "dead");
    transport.fail_token("dead");

    let report = watcher.run(minutes_left(14)).await;

    assert_eq!(report.failed, 1);
    assert_eq!(task(&store, "task-1")["notified15min"], false);
}

#[tokio::test]
async fn test_partial_delivery_sets_flag() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "dead");
    seed_token(&store, "u1", "live");
    transport.fail_token("dead");

    let report = watcher.run(minutes_left(14)).await;

    assert_eq!(report.acted, 1);
    assert_eq!(task(&store, "task-1")["notified15min"], true);
}

#[tokio::test]
async fn test_owner_falls_back_to_creator() {
    let (watcher, store, transport) = watcher();
    seed_task(
        &store,
        "task-1",
        json!({
            "title": "Solo",
            "status": "todo",
            "assignedTo": null,
            "createdBy": "creator",
            "timerStart": NOW,
            "timerDuration": DURATION,
        }),
    );
    seed_token(&store, "creator", "tc");

    watcher.run(minutes_left(14)).await;

    assert_eq!(transport.deliveries_to("tc"), 1);
}

#[tokio::test]
async fn test_malformed_tasks_do_not_block_others() {
    let (watcher, store, transport) = watcher();
    seed_task(&store, "bad-status", json!({"title": "x", "status": "archived"}));
    seed_task(
        &store,
        "bad-duration",
        json!({"title": "y", "assignedTo": "u1", "timerStart": NOW, "timerDuration": "an hour"}),
    );
    seed_running(&store, "good", "u1");
    seed_token(&store, "u1", "t1");

    let report = watcher.run(minutes_left(14)).await;

    assert_eq!(report.acted, 1);
    assert_eq!(report.skipped, 2);
    assert!(report.is_complete_success());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_store_native_timestamps_are_normalized() {
    let (watcher, store, transport) = watcher();
    seed_task(
        &store,
        "task-1",
        json!({
            "title": "Native",
            "assignedTo": "u1",
            "timerStart": {"seconds": NOW / 1000, "nanos": 0},
            "timerDuration": DURATION as f64,
        }),
    );
    seed_token(&store, "u1", "t1");

    watcher.run(minutes_left(14)).await;

    assert_eq!(transport.deliveries_to("t1"), 1);
}

#[tokio::test]
async fn test_new_timer_rearms_warning() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");
    watcher.run(minutes_left(14)).await;

    // User restarts the countdown a day later.
    let restart = NOW + DAY;
    let doc = Document::new("task-1", task(&store, "task-1"));
    let mut current = Task::from_document(&doc).unwrap();
    let patch = current.set_timer(restart, DURATION).unwrap();
    store.insert(&CollectionPath::tasks(), "task-1", {
        let mut fields = task(&store, "task-1");
        fields.extend(patch);
        fields
    });

    watcher.run(restart + DURATION - 14 * MINUTE).await;

    assert_eq!(transport.deliveries_to("t1"), 2);
}

#[tokio::test]
async fn test_out_of_range_timestamps_do_not_abort_pass() {
    let (watcher, store, transport) = watcher();
    seed_task(
        &store,
        "huge-float",
        json!({"title": "a", "assignedTo": "u1", "timerStart": 1e30, "timerDuration": DURATION}),
    );
    seed_task(
        &store,
        "huge-seconds",
        json!({
            "title": "b",
            "assignedTo": "u1",
            "timerStart": {"seconds": i64::MAX / 10},
            "timerDuration": DURATION,
        }),
    );
    seed_task(
        &store,
        "near-max",
        json!({"title": "c", "assignedTo": "u1", "timerStart": i64::MAX - 1, "timerDuration": DURATION}),
    );
    seed_running(&store, "good", "u1");
    seed_token(&store, "u1", "t1");

    let report = watcher.run(minutes_left(14)).await;

    assert_eq!(report.acted, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(task(&store, "good")["notified15min"], true);
}

#[tokio::test]
async fn test_restart_during_pass_keeps_new_warning() {
    let (watcher, store, transport) = watcher();
    seed_running(&store, "task-1", "u1");
    seed_token(&store, "u1", "t1");

    let snapshot = Task::from_document(&Document::new("task-1", task(&store, "task-1"))).unwrap();
    watcher.send_warning(&snapshot).await.unwrap();

    // The user restarts the countdown before the flag is written.
    let restart = NOW + DAY;
    let mut fields = task(&store, "task-1");
    fields.insert("timerStart".to_string(), json!(restart));
    store.insert(&CollectionPath::tasks(), "task-1", fields);

    let written = watcher.mark_notified("task-1", &json!(NOW)).await.unwrap();
    assert!(!written);
    assert_eq!(task(&store, "task-1")["notified15min"], false);

    watcher.run(restart + DURATION - 14 * MINUTE).await;
    assert_eq!(transport.deliveries_to("t1"), 2);
    assert_eq!(task(&store, "task-1")["notified15min"], true);
}

#[tokio::test]
async fn test_flag_for_deleted_task_is_not_written() {
    let (watcher, store, _) = watcher();

    let written = watcher.mark_notified("gone", &json!(NOW)).await.unwrap();

    assert!(!written);
    assert_eq!(store.count(&CollectionPath::tasks()), 0);
}
