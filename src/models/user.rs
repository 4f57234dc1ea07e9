// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User and device token models.

use crate::db::{to_fields, Document, Fields};
use crate::error::AppError;
use crate::time_utils::deserialize_opt_millis;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Employee,
    Manager,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity provider UID (also used as document ID)
    #[serde(skip)]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// Email address (may be None if not shared)
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let mut user: User = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| AppError::InvalidDocument {
                id: doc.id.clone(),
                reason: e.to_string(),
            })?;
        user.id = doc.id.clone();
        Ok(user)
    }
}

/// One push destination registered by a user's device.
///
/// Stored at `users/{uid}/tokens/{token}`; the token string is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    #[serde(skip)]
    pub token: String,
    /// Registration time (ms since epoch)
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub created_at: Option<i64>,
    /// Browser or device description reported at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DeviceToken {
    pub fn new(token: impl Into<String>, created_at: i64, user_agent: Option<String>) -> Self {
        Self {
            token: token.into(),
            created_at: Some(created_at),
            user_agent,
        }
    }

    /// Decode a token document. Unreadable metadata never hides the token.
    pub fn from_document(doc: &Document) -> Self {
        let mut token: DeviceToken = serde_json::from_value(Value::Object(doc.fields.clone()))
            .unwrap_or(DeviceToken {
                token: String::new(),
                created_at: None,
                user_agent: None,
            });
        token.token = doc.id.clone();
        token
    }

    pub fn to_fields(&self) -> Result<Fields, AppError> {
        let value = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encode error: {}", e)))?;
        Ok(to_fields(value))
    }
}
