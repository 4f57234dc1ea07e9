// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use chrono::NaiveTime;
use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID (Firestore database and FCM sender)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Shared secret expected on `/jobs/*` and `/events/*` requests.
    /// When unset those routes reject every request.
    pub jobs_trigger_token: Option<String>,

    // --- Orchestration ---
    /// Run the in-process job scheduler
    pub run_scheduler: bool,
    /// Timer watcher cadence
    pub watcher_interval: Duration,
    /// Token pruner cadence
    pub pruner_interval: Duration,
    /// Daily run time of the recurring task spawner (UTC)
    pub spawner_run_at: NaiveTime,
    /// Wall-clock budget for one job invocation
    pub job_time_budget: Duration,

    // --- Local development ---
    /// Keep documents in memory instead of Firestore
    pub use_memory_store: bool,
    /// Log pushes instead of sending them through FCM
    pub push_dry_run: bool,
}

impl Config {
    /// Config for tests: in-memory store, dry-run push, no background scheduler.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jobs_trigger_token: Some("test_jobs_token".to_string()),
            run_scheduler: false,
            watcher_interval: Duration::from_secs(60),
            pruner_interval: Duration::from_secs(300),
            spawner_run_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
            job_time_budget: Duration::from_secs(240),
            use_memory_store: true,
            push_dry_run: true,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jobs_trigger_token: env::var("JOBS_TRIGGER_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            run_scheduler: parse_bool("RUN_SCHEDULER", true)?,
            watcher_interval: Duration::from_secs(parse_secs("WATCHER_INTERVAL_SECS", 60)?),
            pruner_interval: Duration::from_secs(parse_secs("PRUNER_INTERVAL_SECS", 300)?),
            spawner_run_at: parse_time_of_day("SPAWNER_RUN_AT", "03:00")?,
            job_time_budget: Duration::from_secs(parse_secs("JOB_TIME_BUDGET_SECS", 240)?),

            use_memory_store: parse_bool("USE_MEMORY_STORE", false)?,
            push_dry_run: parse_bool("PUSH_DRY_RUN", false)?,
        })
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key, v)),
        },
    }
}

fn parse_secs(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::Invalid(key, v)),
        },
    }
}

fn parse_time_of_day(key: &'static str, default: &str) -> Result<NaiveTime, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ConfigError::Invalid(key, raw))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
