// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of [`DocumentStore`].
//!
//! Documents are read and written as untyped JSON maps; typed decoding
//! happens in the models layer. Nested collections such as
//! `users/{uid}/tokens` are addressed through Firestore parent paths.

use crate::db::{CollectionPath, Document, DocumentStore, Fields, Filter, FilterValue};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{FirestoreResult, FirestoreWritePrecondition};
use serde_json::Value;

/// The firestore crate injects the document id under this key when
/// deserializing; other `_firestore_*` keys carry metadata we strip.
const FIRESTORE_ID_FIELD: &str = "_firestore_id";
const FIRESTORE_CREATED_FIELD: &str = "_firestore_created";
const FIRESTORE_UPDATED_FIELD: &str = "_firestore_updated";
const FIRESTORE_META_PREFIX: &str = "_firestore_";

/// Firestore-backed document store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Resolve the Firestore parent path for a (possibly nested) collection.
    fn parent_path(&self, collection: &CollectionPath) -> Result<String, AppError> {
        let client = self.get_client()?;
        match collection.parent() {
            Some((parent_collection, parent_id)) => {
                let parent = client
                    .parent_path(parent_collection, parent_id)
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(AsRef::<str>::as_ref(&parent).to_string())
            }
            None => Ok(client.get_documents_path().to_string()),
        }
    }
}

/// Write only the keys of `partial`, leaving other fields untouched.
async fn merge_fields(
    client: &firestore::FirestoreDb,
    collection: &CollectionPath,
    parent: &str,
    id: &str,
    partial: Fields,
    precondition: FirestoreWritePrecondition,
) -> FirestoreResult<()> {
    let field_paths: Vec<String> = partial.keys().cloned().collect();
    let _: () = client
        .fluent()
        .update()
        .fields(field_paths)
        .in_col(collection.name())
        .precondition(precondition)
        .document_id(id)
        .parent(parent)
        .object(&Value::Object(partial))
        .execute()
        .await?;
    Ok(())
}

/// Convert a deserialized Firestore object into a [`Document`].
///
/// The store-managed creation time is kept as `createdAt` when the document
/// does not carry its own.
fn into_document(value: Value) -> Result<Document, AppError> {
    let Value::Object(mut fields) = value else {
        return Err(AppError::Database(
            "Firestore returned a non-object document".to_string(),
        ));
    };

    let id = match fields.remove(FIRESTORE_ID_FIELD) {
        Some(Value::String(id)) => id,
        _ => {
            return Err(AppError::Database(
                "Firestore document is missing its id".to_string(),
            ))
        }
    };

    if let Some(created) = fields.remove(FIRESTORE_CREATED_FIELD) {
        fields.entry("createdAt").or_insert(created);
    }
    fields.retain(|key, _| !key.starts_with(FIRESTORE_META_PREFIX));

    Ok(Document::new(id, fields))
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let parent = self.parent_path(collection)?;
        let value: Option<Value> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection.name())
            .parent(&parent)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        value.map(into_document).transpose()
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        filter: &Filter,
    ) -> Result<Vec<Document>, AppError> {
        let parent = self.parent_path(collection)?;
        let select = self
            .get_client()?
            .fluent()
            .select()
            .from(collection.name())
            .parent(&parent);

        let values: Vec<Value> = match filter {
            Filter::All => select.obj().query().await,
            Filter::FieldEq(field, value) => {
                let field = field.clone();
                let value = value.clone();
                select
                    .filter(move |q| match &value {
                        FilterValue::Bool(b) => q.field(field.as_str()).eq(*b),
                        FilterValue::Int(i) => q.field(field.as_str()).eq(*i),
                        FilterValue::Str(s) => q.field(field.as_str()).eq(s.clone()),
                    })
                    .obj()
                    .query()
                    .await
            }
        }
        .map_err(|e| AppError::Database(e.to_string()))?;

        values.into_iter().map(into_document).collect()
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError> {
        let parent = self.parent_path(collection)?;
        let insert = self.get_client()?.fluent().insert().into(collection.name());
        let insert = match id {
            Some(id) => insert.document_id(id),
            None => insert.generate_document_id(),
        };

        let created: Value = insert
            .parent(&parent)
            .object(&Value::Object(fields))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let doc = into_document(created)?;
        tracing::debug!(collection = %collection, id = %doc.id, "Document created");
        Ok(doc.id)
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), AppError> {
        let parent = self.parent_path(collection)?;
        let exists = FirestoreWritePrecondition::Exists(true);

        match merge_fields(self.get_client()?, collection, &parent, id, partial, exists).await {
            Ok(()) => Ok(()),
            Err(FirestoreError::DataNotFoundError(_)) => {
                Err(AppError::NotFound(format!("{}/{}", collection, id)))
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn update_if(
        &self,
        collection: &CollectionPath,
        id: &str,
        field: &str,
        expected: &Value,
        partial: Fields,
    ) -> Result<bool, AppError> {
        let parent = self.parent_path(collection)?;
        let client = self.get_client()?;

        let current: Option<Value> = client
            .fluent()
            .select()
            .by_id_in(collection.name())
            .parent(&parent)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let Some(current) = current else {
            return Ok(false);
        };
        if current.get(field).unwrap_or(&Value::Null) != expected {
            return Ok(false);
        }

        // Pin the write to the revision just compared.
        let precondition = current
            .get(FIRESTORE_UPDATED_FIELD)
            .and_then(Value::as_str)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| FirestoreWritePrecondition::UpdateTime(ts.with_timezone(&Utc)))
            .unwrap_or(FirestoreWritePrecondition::Exists(true));

        match merge_fields(client, collection, &parent, id, partial, precondition).await {
            Ok(()) => Ok(true),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(false),
            Err(FirestoreError::DatabaseError(e)) if e.public.code == "FailedPrecondition" => {
                tracing::debug!(collection = %collection, id, "Document changed before guarded write");
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), AppError> {
        let parent = self.parent_path(collection)?;
        self.get_client()?
            .fluent()
            .delete()
            .from(collection.name())
            .document_id(id)
            .parent(&parent)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
