// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Taskbeacon API server and job scheduler.

use std::sync::Arc;
use taskbeacon::{
    config::Config,
    db::{DocumentStore, FirestoreStore, MemoryStore},
    scheduler,
    services::{FcmTransport, PushTransport, RecordingTransport},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Taskbeacon");

    let store: Arc<dyn DocumentStore> = if config.use_memory_store {
        tracing::warn!("Using in-memory document store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FirestoreStore::new(&config.gcp_project_id).await?)
    };

    let transport: Arc<dyn PushTransport> = if config.push_dry_run {
        tracing::warn!("Push dry run enabled; notifications are only logged");
        Arc::new(RecordingTransport::new())
    } else {
        tracing::info!(project = %config.gcp_project_id, "FCM transport initialized");
        Arc::new(FcmTransport::new(&config.gcp_project_id))
    };

    if config.jobs_trigger_token.is_none() {
        tracing::warn!("JOBS_TRIGGER_TOKEN not set; /jobs and /events routes will refuse requests");
    }

    let state = Arc::new(AppState::new(config.clone(), store, transport));

    if config.run_scheduler {
        scheduler::start(Arc::clone(&state));
    } else {
        tracing::info!("In-process scheduler disabled; jobs run only via HTTP triggers");
    }

    let app = taskbeacon::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskbeacon=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
