//! Document-oriented datastore boundary (the hosted cloud database).
//!
//! Documents live in named collections (`users/{uid}/ingredients`), carry a
//! store-assigned id and a flat JSON object of fields. A collection can be
//! watched: the receiver always holds the latest full snapshot.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },
}

impl RemoteError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied(_))
    }
}

/// Latest snapshot of a watched collection.
pub type Snapshot = watch::Receiver<Vec<Document>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// A fresh, unused document id.
    fn allocate_id(&self) -> String;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError>;

    /// Merge `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError>;

    /// Subscribe to every change of `collection`.
    async fn watch(&self, collection: &str) -> Result<Snapshot, RemoteError>;

    /// Create a document under a new id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, RemoteError> {
        let id = self.allocate_id();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }
}
