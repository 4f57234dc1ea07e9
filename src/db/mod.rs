// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Jobs talk to the document store through the [`DocumentStore`] trait, a
//! generic CRUD surface over JSON-shaped documents. [`FirestoreStore`] is the
//! production backend; [`MemoryStore`] backs local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Collection names as constants.
pub mod collections {
    pub const TASKS: &str = "tasks";
    pub const USERS: &str = "users";
    /// Subcollection under `users/{uid}` keyed by the token string
    pub const TOKENS: &str = "tokens";
}

/// Document fields as stored.
pub type Fields = Map<String, Value>;

/// Turn a JSON object into document fields. Non-objects yield no fields.
pub fn to_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// A stored document: store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Path of a collection, either top-level (`tasks`) or nested under a parent
/// document (`users/{uid}/tokens`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    parent: Option<(String, String)>,
    name: String,
}

impl CollectionPath {
    pub fn root(name: &str) -> Self {
        Self {
            parent: None,
            name: name.to_string(),
        }
    }

    pub fn nested(parent_collection: &str, parent_id: &str, name: &str) -> Self {
        Self {
            parent: Some((parent_collection.to_string(), parent_id.to_string())),
            name: name.to_string(),
        }
    }

    pub fn tasks() -> Self {
        Self::root(collections::TASKS)
    }

    pub fn users() -> Self {
        Self::root(collections::USERS)
    }

    pub fn user_tokens(user_id: &str) -> Self {
        Self::nested(collections::USERS, user_id, collections::TOKENS)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<(&str, &str)> {
        self.parent
            .as_ref()
            .map(|(col, id)| (col.as_str(), id.as_str()))
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parent {
            Some((col, id)) => write!(f, "{}/{}/{}", col, id, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Scalar accepted in equality filters.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl FilterValue {
    /// Whether a stored field value equals this filter value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Bool(b), Value::Bool(v)) => b == v,
            (FilterValue::Int(i), Value::Number(n)) => n.as_i64() == Some(*i),
            (FilterValue::Str(s), Value::String(v)) => s == v,
            _ => false,
        }
    }
}

/// Query filter. Only the shapes the jobs need are supported.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Collection-wide scan
    All,
    /// Equality on a single field
    FieldEq(String, FilterValue),
}

impl Filter {
    pub fn eq(field: &str, value: FilterValue) -> Self {
        Filter::FieldEq(field.to_string(), value)
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::All => true,
            Filter::FieldEq(field, value) => fields.get(field).is_some_and(|v| value.matches(v)),
        }
    }
}

/// Generic CRUD over the document store.
///
/// Implementations must be safe to share across concurrently running jobs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document, `None` if absent.
    async fn get(&self, collection: &CollectionPath, id: &str)
        -> Result<Option<Document>, AppError>;

    /// Fetch every document matching `filter`.
    async fn query(
        &self,
        collection: &CollectionPath,
        filter: &Filter,
    ) -> Result<Vec<Document>, AppError>;

    /// Create a document and return its id. With `id = None` the store
    /// assigns one. Creating an id that already exists is an error.
    async fn create(
        &self,
        collection: &CollectionPath,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError>;

    /// Merge `partial` into an existing document. Never creates one: a
    /// missing document is [`AppError::NotFound`].
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), AppError>;

    /// Merge `partial` only while `field` still holds `expected`.
    ///
    /// Returns `false` and writes nothing when the document is gone or the
    /// field changed since the caller read it.
    async fn update_if(
        &self,
        collection: &CollectionPath,
        id: &str,
        field: &str,
        expected: &Value,
        partial: Fields,
    ) -> Result<bool, AppError>;

    /// Delete a document. Deleting an absent document succeeds.
    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), AppError>;
}
