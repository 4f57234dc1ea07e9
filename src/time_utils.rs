// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! All scheduling math is done in UTC milliseconds since the epoch. Stored
//! timestamps arrive in several shapes (raw millis, RFC 3339 strings,
//! `{seconds, nanos}` objects) and are normalized here.

use chrono::{DateTime, NaiveTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const DAY_MS: i64 = 86_400_000;

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable date used to suffix spawned task titles, e.g. `Oct 15, 2026`.
pub fn format_occurrence_date(now_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .format("%b %-d, %Y")
        .to_string()
}

/// Truncate a float to `i64`, rejecting values `as` would saturate.
fn whole_from_f64(f: f64) -> Option<i64> {
    (f.is_finite() && (i64::MIN as f64..i64::MAX as f64).contains(&f)).then(|| f.trunc() as i64)
}

/// Convert any supported timestamp representation to milliseconds.
pub fn normalize_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_from_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|d| d.timestamp_millis())
            })
        }
        Value::Object(map) => {
            let secs = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanos")
                .or_else(|| map.get("nanoseconds"))
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            secs.checked_mul(1000)?.checked_add(nanos / 1_000_000)
        }
        _ => None,
    }
}

/// Coerce a stored number-ish value to a whole number, truncating fractions.
pub fn coerce_whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_from_f64)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole_from_f64),
        _ => None,
    }
}

/// Lenient serde adapter: unreadable timestamps decode as absent.
pub fn deserialize_opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(normalize_millis))
}

/// Lenient serde adapter for integer counts stored as numbers or strings.
pub fn deserialize_opt_whole<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_whole_number))
}

/// Next occurrence of `at` (UTC) strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}
