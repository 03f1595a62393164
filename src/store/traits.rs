//! Document store trait definitions

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored document body: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Errors that can occur during document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A document as returned by a collection read.
///
/// The id is the document key, kept apart from the body the same way the
/// remote store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// The first delete that failed inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of a batched delete.
///
/// `applied` lists the ids the store actually removed, in the order they
/// were removed. A batch that stopped early carries the failing id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDelete {
    pub applied: Vec<String>,
    pub failed: Option<BatchFailure>,
}

impl BatchDelete {
    /// True if every requested id was deleted
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

/// Contract for the remote document store.
///
/// Collections are addressed by a slash-separated path such as
/// `groups/g1/campaigns/c1/locations`. Implementations must be thread-safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read every document in a collection
    async fn get_collection(&self, collection: &str) -> StoreResult<Vec<StoredDocument>>;

    /// Create or overwrite a document
    async fn set_document(&self, collection: &str, id: &str, value: Document) -> StoreResult<()>;

    /// Shallow-merge `partial` into an existing document.
    ///
    /// Fails with `StoreError::NotFound` if the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Delete several documents in the given order.
    ///
    /// The default issues one `delete_document` per id and stops at the first
    /// failure. Stores with multi-key transactions should override this so a
    /// batch is all-or-nothing.
    async fn delete_documents(&self, collection: &str, ids: &[String]) -> BatchDelete {
        let mut report = BatchDelete::default();
        for id in ids {
            match self.delete_document(collection, id).await {
                Ok(()) => report.applied.push(id.clone()),
                Err(e) => {
                    report.failed = Some(BatchFailure {
                        id: id.clone(),
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }
        report
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: DocumentStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<std::path::Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}

/// Shallow merge of `partial` into `target`: top-level keys are replaced.
pub fn merge_document(target: &mut Document, partial: &Document) {
    for (key, value) in partial {
        target.insert(key.clone(), value.clone());
    }
}

/// Wrap a `serde_json::Value` that must be an object.
pub fn into_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::de::Error::custom(format!(
            "expected a JSON object, found {}",
            kind_of(&other)
        )))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
