// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store for local development and tests.
//!
//! Documents live in an `Arc<RwLock<..>>` and are lost when the last clone is
//! dropped. Failures can be injected per collection or per document so that
//! callers can observe how jobs behave when the store misbehaves mid-batch.

use super::{CollectionPath, Document, DocumentStore, Fields, Filter};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

type Collections = HashMap<CollectionPath, BTreeMap<String, Fields>>;

#[derive(Debug, Default)]
struct FailurePlan {
    queries: HashSet<CollectionPath>,
    creates: HashSet<CollectionPath>,
    updates: HashSet<String>,
    deletes: HashSet<String>,
}

/// Thread-safe, cheaply cloneable in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    failures: Arc<Mutex<FailurePlan>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing failure injection.
    pub fn insert(&self, collection: &CollectionPath, id: &str, fields: Fields) {
        if let Ok(mut guard) = self.collections.write() {
            guard
                .entry(collection.clone())
                .or_default()
                .insert(id.to_string(), fields);
        }
    }

    /// Read a document directly, bypassing failure injection.
    pub fn peek(&self, collection: &CollectionPath, id: &str) -> Option<Fields> {
        self.collections
            .read()
            .ok()?
            .get(collection)?
            .get(id)
            .cloned()
    }

    /// Number of documents currently in `collection`.
    pub fn count(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .map(|guard| guard.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Make every query on `collection` fail.
    pub fn fail_queries_on(&self, collection: &CollectionPath) {
        self.with_failures(|f| {
            f.queries.insert(collection.clone());
        });
    }

    /// Make every create in `collection` fail.
    pub fn fail_creates_in(&self, collection: &CollectionPath) {
        self.with_failures(|f| {
            f.creates.insert(collection.clone());
        });
    }

    /// Make updates of the document `id` (in any collection) fail.
    pub fn fail_updates_on(&self, id: &str) {
        self.with_failures(|f| {
            f.updates.insert(id.to_string());
        });
    }

    /// Make deletes of the document `id` (in any collection) fail.
    pub fn fail_deletes_on(&self, id: &str) {
        self.with_failures(|f| {
            f.deletes.insert(id.to_string());
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.with_failures(|f| *f = FailurePlan::default());
    }

    fn with_failures(&self, apply: impl FnOnce(&mut FailurePlan)) {
        if let Ok(mut guard) = self.failures.lock() {
            apply(&mut guard);
        }
    }

    fn should_fail(&self, check: impl FnOnce(&FailurePlan) -> bool) -> bool {
        self.failures.lock().map(|f| check(&f)).unwrap_or(false)
    }

    fn generate_id(&self) -> String {
        format!("mem-{:08}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

fn poisoned() -> AppError {
    AppError::Database("memory store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let guard = self.collections.read().map_err(|_| poisoned())?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        filter: &Filter,
    ) -> Result<Vec<Document>, AppError> {
        if self.should_fail(|f| f.queries.contains(collection)) {
            return Err(AppError::Database(format!(
                "injected query failure on {}",
                collection
            )));
        }

        let guard = self.collections.read().map_err(|_| poisoned())?;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.matches(fields))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError> {
        if self.should_fail(|f| f.creates.contains(collection)) {
            return Err(AppError::Database(format!(
                "injected create failure in {}",
                collection
            )));
        }

        let id = id.map_or_else(|| self.generate_id(), str::to_string);
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let docs = guard.entry(collection.clone()).or_default();
        if docs.contains_key(&id) {
            return Err(AppError::Database(format!(
                "document {}/{} already exists",
                collection, id
            )));
        }
        docs.insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), AppError> {
        if self.should_fail(|f| f.updates.contains(id)) {
            return Err(AppError::Database(format!(
                "injected update failure on {}/{}",
                collection, id
            )));
        }

        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;
        doc.extend(partial);
        Ok(())
    }

    async fn update_if(
        &self,
        collection: &CollectionPath,
        id: &str,
        field: &str,
        expected: &Value,
        partial: Fields,
    ) -> Result<bool, AppError> {
        if self.should_fail(|f| f.updates.contains(id)) {
            return Err(AppError::Database(format!(
                "injected update failure on {}/{}",
                collection, id
            )));
        }

        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let Some(doc) = guard.get_mut(collection).and_then(|docs| docs.get_mut(id)) else {
            return Ok(false);
        };
        if doc.get(field).unwrap_or(&Value::Null) != expected {
            return Ok(false);
        }
        doc.extend(partial);
        Ok(true)
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), AppError> {
        if self.should_fail(|f| f.deletes.contains(id)) {
            return Err(AppError::Database(format!(
                "injected delete failure on {}/{}",
                collection, id
            )));
        }

        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        if let Some(docs) = guard.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
