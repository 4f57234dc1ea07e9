// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use std::sync::Arc;
use taskbeacon::config::Config;
use taskbeacon::db::{to_fields, CollectionPath, FirestoreStore, Fields, MemoryStore};
use taskbeacon::routes::create_router;
use taskbeacon::services::RecordingTransport;
use taskbeacon::AppState;

/// 2025-10-09T08:53:20Z
#[allow(dead_code)]
pub const NOW: i64 = 1_760_000_000_000;

#[allow(dead_code)]
pub const MINUTE: i64 = 60 * 1000;

#[allow(dead_code)]
pub const DAY: i64 = 86_400_000;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// App wired to an in-memory store and a recording transport.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub transport: RecordingTransport,
}

#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let store = MemoryStore::new();
    let transport = RecordingTransport::new();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(store.clone()),
        Arc::new(transport.clone()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        transport,
    }
}

#[allow(dead_code)]
pub fn fields(value: Value) -> Fields {
    to_fields(value)
}

#[allow(dead_code)]
pub fn seed_task(store: &MemoryStore, id: &str, value: Value) {
    store.insert(&CollectionPath::tasks(), id, to_fields(value));
}

#[allow(dead_code)]
pub fn seed_user(store: &MemoryStore, user_id: &str) {
    store.insert(
        &CollectionPath::users(),
        user_id,
        to_fields(serde_json::json!({"name": user_id, "role": "employee"})),
    );
}

#[allow(dead_code)]
pub fn seed_token(store: &MemoryStore, user_id: &str, token: &str) {
    store.insert(
        &CollectionPath::user_tokens(user_id),
        token,
        to_fields(serde_json::json!({"createdAt": NOW})),
    );
}

#[allow(dead_code)]
pub fn task(store: &MemoryStore, id: &str) -> Fields {
    store
        .peek(&CollectionPath::tasks(), id)
        .expect("task should exist")
}

/// Request with the test trigger token attached.
#[allow(dead_code)]
pub fn authorized_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer test_jobs_token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
