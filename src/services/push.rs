// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push notification transport.
//!
//! Jobs deliver through the [`PushTransport`] trait:
//! - [`FcmTransport`] talks to the Firebase Cloud Messaging HTTP v1 API
//! - [`RecordingTransport`] records sends instead (dry runs and tests)

use crate::error::AppError;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Per-call cap on concurrent FCM requests.
const MAX_CONCURRENT_SENDS: usize = 16;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// What to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// User-visible notification
    Alert { title: String, body: String },
    /// Data-only message that shows nothing on the device. Used to check
    /// whether a token is still deliverable.
    Ping,
}

impl Notification {
    pub fn alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Notification::Alert {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Notification::Alert { title, .. } => Some(title),
            Notification::Ping => None,
        }
    }

    /// FCM v1 `message` object addressed to `token`.
    fn to_fcm_message(&self, token: &str) -> serde_json::Value {
        match self {
            Notification::Alert { title, body } => json!({
                "message": {
                    "token": token,
                    "notification": { "title": title, "body": body }
                }
            }),
            Notification::Ping => json!({
                "message": {
                    "token": token,
                    "data": { "ping": "1" }
                }
            }),
        }
    }
}

/// Outcome for one destination token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub token: String,
    pub success: bool,
    /// The push service refused this token itself (unregistered or
    /// malformed). Only then is the token known to be dead.
    pub rejected: bool,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(token: &str) -> Self {
        Self {
            token: token.to_string(),
            success: true,
            rejected: false,
            error: None,
        }
    }

    /// Not delivered because the token is no longer valid.
    pub fn rejected(token: &str, error: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            success: false,
            rejected: true,
            error: Some(error.into()),
        }
    }

    /// Not delivered for reasons unrelated to the token (network, quota,
    /// server errors). Says nothing about whether the token is alive.
    pub fn unreachable(token: &str, error: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            success: false,
            rejected: false,
            error: Some(error.into()),
        }
    }
}

/// Multicast push delivery.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Send `notification` to every token.
    ///
    /// On `Ok`, the result holds exactly one entry per input token, in input
    /// order. `Err` means nothing could be attempted (for example missing
    /// credentials) and says nothing about individual tokens.
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> Result<Vec<DeliveryResult>, AppError>;
}

/// Count of successful entries in a multicast result.
pub fn success_count(results: &[DeliveryResult]) -> usize {
    results.iter().filter(|r| r.success).count()
}

/// Map one FCM HTTP v1 response onto a delivery result.
///
/// Token verdicts are 404 / `UNREGISTERED`, 400 `INVALID_ARGUMENT` and
/// 403 `SENDER_ID_MISMATCH`. Quota (429), auth and server errors are not.
fn classify_response(token: &str, status: reqwest::StatusCode, body: &str) -> DeliveryResult {
    if status.is_success() {
        return DeliveryResult::delivered(token);
    }

    let error = format!("HTTP {}: {}", status, body);
    let token_verdict = match status {
        reqwest::StatusCode::NOT_FOUND => true,
        reqwest::StatusCode::BAD_REQUEST => {
            body.contains("INVALID_ARGUMENT") || body.contains("UNREGISTERED")
        }
        reqwest::StatusCode::FORBIDDEN => body.contains("SENDER_ID_MISMATCH"),
        _ => false,
    };
    if token_verdict {
        DeliveryResult::rejected(token, error)
    } else {
        DeliveryResult::unreachable(token, error)
    }
}

/// Firebase Cloud Messaging HTTP v1 client.
pub struct FcmTransport {
    http: reqwest::Client,
    send_url: String,
    auth: OnceCell<gcloud_sdk::GoogleAuthTokenGenerator>,
}

impl FcmTransport {
    pub fn new(project_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            send_url: format!(
                "https://fcm.googleapis.com/v1/projects/{}/messages:send",
                project_id
            ),
            auth: OnceCell::new(),
        }
    }

    /// OAuth bearer header from application default credentials.
    ///
    /// The generator is created on first use so that the server can start
    /// without credentials (sends then fail as a whole).
    async fn authorization(&self) -> Result<String, AppError> {
        let generator = self
            .auth
            .get_or_try_init(|| async {
                gcloud_sdk::GoogleAuthTokenGenerator::new(
                    gcloud_sdk::TokenSourceType::Default,
                    vec![FCM_SCOPE.to_string()],
                )
                .await
            })
            .await
            .map_err(|e| AppError::Push(format!("FCM credentials unavailable: {}", e)))?;

        let token = generator
            .create_token()
            .await
            .map_err(|e| AppError::Push(format!("FCM token error: {}", e)))?;
        Ok(token.header_value())
    }

    async fn send_one(
        &self,
        authorization: &str,
        token: &str,
        notification: &Notification,
    ) -> DeliveryResult {
        let response = self
            .http
            .post(&self.send_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&notification.to_fcm_message(token))
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                let body = if status.is_success() {
                    String::new()
                } else {
                    response.text().await.unwrap_or_default()
                };
                classify_response(token, status, &body)
            }
            Err(e) => DeliveryResult::unreachable(token, e.to_string()),
        }
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> Result<Vec<DeliveryResult>, AppError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let authorization = self.authorization().await?;

        let sends: Vec<_> = tokens
            .iter()
            .map(|token| self.send_one(&authorization, token, notification))
            .collect();
        // `buffered` keeps results in input order.
        let results: Vec<DeliveryResult> = stream::iter(sends)
            .buffered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        tracing::debug!(
            requested = tokens.len(),
            succeeded = success_count(&results),
            "FCM multicast complete"
        );
        Ok(results)
    }
}

/// One recorded multicast call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPush {
    pub tokens: Vec<String>,
    pub notification: Notification,
}

#[derive(Debug, Default)]
struct Recorder {
    sent: Vec<SentPush>,
    failing_tokens: HashSet<String>,
    unreachable_tokens: HashSet<String>,
    fail_calls: bool,
}

/// Transport that logs and records every send instead of delivering.
///
/// Tokens can be scripted to fail, and whole calls can be made to error.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report failure for `token` on every subsequent send.
    pub fn fail_token(&self, token: &str) {
        self.with(|r| {
            r.failing_tokens.insert(token.to_string());
        });
    }

    /// Report `token` as undeliverable for a reason unrelated to the token
    /// itself, as during a push service outage.
    pub fn fail_token_transiently(&self, token: &str) {
        self.with(|r| {
            r.unreachable_tokens.insert(token.to_string());
        });
    }

    /// Make every subsequent call return `Err` (or stop doing so).
    pub fn fail_calls(&self, fail: bool) {
        self.with(|r| r.fail_calls = fail);
    }

    /// All recorded calls, oldest first.
    pub fn sent(&self) -> Vec<SentPush> {
        self.inner.lock().map(|r| r.sent.clone()).unwrap_or_default()
    }

    /// Number of successful deliveries made to `token`.
    pub fn deliveries_to(&self, token: &str) -> usize {
        self.inner
            .lock()
            .map(|r| {
                if r.failing_tokens.contains(token) || r.unreachable_tokens.contains(token) {
                    return 0;
                }
                r.sent
                    .iter()
                    .filter(|push| push.tokens.iter().any(|t| t == token))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.with(|r| r.sent.clear());
    }

    fn with(&self, apply: impl FnOnce(&mut Recorder)) {
        if let Ok(mut guard) = self.inner.lock() {
            apply(&mut guard);
        }
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> Result<Vec<DeliveryResult>, AppError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AppError::Push("recorder lock poisoned".to_string()))?;

        if guard.fail_calls {
            return Err(AppError::Push("push transport unavailable".to_string()));
        }

        guard.sent.push(SentPush {
            tokens: tokens.to_vec(),
            notification: notification.clone(),
        });

        let results: Vec<DeliveryResult> = tokens
            .iter()
            .map(|token| {
                if guard.failing_tokens.contains(token) {
                    DeliveryResult::rejected(token, "registration-token-not-registered")
                } else if guard.unreachable_tokens.contains(token) {
                    DeliveryResult::unreachable(token, "HTTP 503 Service Unavailable")
                } else {
                    DeliveryResult::delivered(token)
                }
            })
            .collect();

        tracing::info!(
            tokens = tokens.len(),
            succeeded = success_count(&results),
            title = notification.title().unwrap_or("<ping>"),
            "Push recorded (dry run)"
        );
        Ok(results)
    }
}
