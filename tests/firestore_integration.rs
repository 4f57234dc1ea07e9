// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it. Every test works on fresh
//! document IDs, so runs do not interfere with each other.

use serde_json::json;
use std::sync::Arc;
use taskbeacon::db::{CollectionPath, DocumentStore, Filter, FilterValue};
use taskbeacon::error::AppError;
use taskbeacon::services::{RecordingTransport, TimerWatcher, TokenRegistry};
use taskbeacon::time_utils::now_ms;

mod common;
use common::{fields, test_firestore, MINUTE};

/// Unique suffix for test isolation.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENT CRUD
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_task_create_update_delete() {
    require_emulator!();

    let db = test_firestore().await;
    let tasks = CollectionPath::tasks();
    let id = unique_id("task");

    assert!(db.get(&tasks, &id).await.unwrap().is_none());

    db.create(
        &tasks,
        Some(&id),
        fields(json!({"title": "Emulated", "status": "todo", "notified15min": false})),
    )
    .await
    .unwrap();

    db.update(&tasks, &id, fields(json!({"notified15min": true})))
        .await
        .unwrap();

    let doc = db.get(&tasks, &id).await.unwrap().expect("task should exist");
    assert_eq!(doc.id, id);
    assert_eq!(doc.fields["title"], "Emulated");
    assert_eq!(doc.fields["notified15min"], true);

    db.delete(&tasks, &id).await.unwrap();
    assert!(db.get(&tasks, &id).await.unwrap().is_none());

    // Deleting again is not an error.
    db.delete(&tasks, &id).await.unwrap();
}

#[tokio::test]
async fn test_update_never_creates() {
    require_emulator!();

    let db = test_firestore().await;
    let tasks = CollectionPath::tasks();
    let id = unique_id("missing");

    let result = db
        .update(&tasks, &id, fields(json!({"notified15min": true})))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))), "{:?}", result);
    assert!(db.get(&tasks, &id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_guarded_update_compares_field() {
    require_emulator!();

    let db = test_firestore().await;
    let tasks = CollectionPath::tasks();
    let id = unique_id("guarded");
    db.create(
        &tasks,
        Some(&id),
        fields(json!({"timerStart": 1000, "notified15min": false})),
    )
    .await
    .unwrap();
    let flag = || fields(json!({"notified15min": true}));

    let stale = db
        .update_if(&tasks, &id, "timerStart", &json!(999), flag())
        .await
        .unwrap();
    assert!(!stale);
    let doc = db.get(&tasks, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["notified15min"], false);

    let current = db
        .update_if(&tasks, &id, "timerStart", &json!(1000), flag())
        .await
        .unwrap();
    assert!(current);
    let doc = db.get(&tasks, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["notified15min"], true);

    let gone = db
        .update_if(&tasks, &unique_id("gone"), "timerStart", &json!(1000), flag())
        .await
        .unwrap();
    assert!(!gone);
}

#[tokio::test]
async fn test_generated_ids_and_equality_query() {
    require_emulator!();

    let db = test_firestore().await;
    let tasks = CollectionPath::tasks();
    let marker = unique_id("batch");

    let first = db
        .create(&tasks, None, fields(json!({"batch": marker, "n": 1})))
        .await
        .unwrap();
    let second = db
        .create(&tasks, None, fields(json!({"batch": marker, "n": 2})))
        .await
        .unwrap();
    assert_ne!(first, second);

    let found = db
        .query(&tasks, &Filter::eq("batch", FilterValue::Str(marker)))
        .await
        .unwrap();
    let mut ids: Vec<_> = found.into_iter().map(|doc| doc.id).collect();
    ids.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_nested_token_registry() {
    require_emulator!();

    let db = Arc::new(test_firestore().await);
    let registry = TokenRegistry::new(db.clone());
    let user_id = unique_id("user");

    let agent = Some("Firefox".to_string());
    assert!(registry.register(&user_id, "tok-a", agent, now_ms()).await.unwrap());
    assert!(!registry.register(&user_id, "tok-a", None, now_ms()).await.unwrap());
    assert!(registry.register(&user_id, "tok-b", None, now_ms()).await.unwrap());

    let mut live = registry.live_tokens(&user_id).await.unwrap();
    live.sort();
    assert_eq!(live, vec!["tok-a", "tok-b"]);

    registry.unregister(&user_id, "tok-a").await.unwrap();
    assert_eq!(registry.live_tokens(&user_id).await.unwrap(), vec!["tok-b"]);

    // Another user's subcollection is untouched.
    let other = unique_id("user");
    assert!(registry.live_tokens(&other).await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// JOB PASSES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_timer_warning_persists_flag() {
    require_emulator!();

    let db = Arc::new(test_firestore().await);
    let transport = RecordingTransport::new();
    let watcher = TimerWatcher::new(db.clone(), Arc::new(transport.clone()));

    let owner = unique_id("owner");
    let task_id = unique_id("timed");
    let now = now_ms();
    db.create(
        &CollectionPath::tasks(),
        Some(&task_id),
        fields(json!({
            "title": "Emulated timer",
            "status": "in-progress",
            "assignedTo": owner,
            "timerStart": now - 46 * MINUTE,
            "timerDuration": 60 * MINUTE,
            "notified15min": false,
        })),
    )
    .await
    .unwrap();
    TokenRegistry::new(db.clone())
        .register(&owner, "emu-token", None, now)
        .await
        .unwrap();

    watcher.run(now).await;

    assert_eq!(transport.deliveries_to("emu-token"), 1);
    let doc = db
        .get(&CollectionPath::tasks(), &task_id)
        .await
        .unwrap()
        .expect("task should exist");
    assert_eq!(doc.fields["notified15min"], true);
}
