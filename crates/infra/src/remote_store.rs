//! Cloud-mode pantry persistence: one user's collections in a
//! [`DocumentStore`].
//!
//! Snapshots are ordered newest first (active by `createdAt`, trash by
//! `deletedAt`), ties broken by id. Documents that fail to decode are
//! logged and left out of the snapshot.

use std::cmp::Reverse;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use larder_core::{IngredientId, UserId};
use larder_pantry::{Ingredient, IngredientPatch, NewIngredient, TrashedIngredient};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::document::{Document, DocumentStore, Fields, RemoteError, Snapshot};

/// Records that can be stored as documents (the id lives outside the fields).
pub trait RemoteRecord: Serialize + DeserializeOwned {
    fn id(&self) -> &IngredientId;
    fn sort_key(&self) -> DateTime<Utc>;
}

impl RemoteRecord for Ingredient {
    fn id(&self) -> &IngredientId {
        &self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl RemoteRecord for TrashedIngredient {
    fn id(&self) -> &IngredientId {
        &self.ingredient.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.deleted_at
    }
}

pub fn to_fields<T: RemoteRecord>(record: &T) -> Result<Fields, RemoteError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            Ok(map)
        }
        Ok(_) => Err(RemoteError::Malformed {
            id: record.id().to_string(),
            reason: "record did not serialize to an object".to_string(),
        }),
        Err(e) => Err(RemoteError::Malformed {
            id: record.id().to_string(),
            reason: e.to_string(),
        }),
    }
}

pub fn from_document<T: RemoteRecord>(doc: &Document) -> Result<T, RemoteError> {
    let mut fields = doc.fields.clone();
    fields.insert("id".to_string(), Value::String(doc.id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|e| RemoteError::Malformed {
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

/// Decode and order a raw snapshot.
pub fn decode_snapshot<T: RemoteRecord>(docs: &[Document]) -> Vec<T> {
    let mut records: Vec<T> = docs
        .iter()
        .filter_map(|doc| match from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping document: {}", e);
                None
            }
        })
        .collect();
    records.sort_by(|a, b| {
        (Reverse(a.sort_key()), a.id().as_str()).cmp(&(Reverse(b.sort_key()), b.id().as_str()))
    });
    records
}

/// Live view of one collection, decoded on read.
///
/// Dropping the subscription detaches it from the store.
#[derive(Debug, Clone)]
pub struct Subscription<T> {
    rx: Snapshot,
    _record: PhantomData<fn() -> T>,
}

impl<T: RemoteRecord> Subscription<T> {
    fn new(rx: Snapshot) -> Self {
        Self {
            rx,
            _record: PhantomData,
        }
    }

    /// The latest snapshot.
    pub fn current(&self) -> Vec<T> {
        decode_snapshot(&self.rx.borrow())
    }

    /// Wait for the next change. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[derive(Clone)]
pub struct RemotePantryStore {
    store: Arc<dyn DocumentStore>,
    active: String,
    trash: String,
}

impl RemotePantryStore {
    pub fn new(store: Arc<dyn DocumentStore>, user: &UserId) -> Self {
        Self {
            store,
            active: format!("users/{user}/ingredients"),
            trash: format!("users/{user}/trash"),
        }
    }

    pub fn active_collection(&self) -> &str {
        &self.active
    }

    pub fn trash_collection(&self) -> &str {
        &self.trash
    }

    pub async fn subscribe_active(&self) -> Result<Subscription<Ingredient>, RemoteError> {
        Ok(Subscription::new(self.store.watch(&self.active).await?))
    }

    pub async fn subscribe_trash(&self) -> Result<Subscription<TrashedIngredient>, RemoteError> {
        Ok(Subscription::new(self.store.watch(&self.trash).await?))
    }

    pub async fn list_active(&self) -> Result<Vec<Ingredient>, RemoteError> {
        Ok(decode_snapshot(&self.store.list(&self.active).await?))
    }

    pub async fn list_trash(&self) -> Result<Vec<TrashedIngredient>, RemoteError> {
        Ok(decode_snapshot(&self.store.list(&self.trash).await?))
    }

    /// Create an active record under a store-assigned id.
    pub async fn create(&self, new: NewIngredient, at: DateTime<Utc>) -> Result<Ingredient, RemoteError> {
        let id = IngredientId::from(self.store.allocate_id());
        let ingredient = new.into_ingredient(id, at);
        self.put_active(&ingredient).await?;
        Ok(ingredient)
    }

    /// Write an active record under its own id.
    pub async fn put_active(&self, ingredient: &Ingredient) -> Result<(), RemoteError> {
        self.store
            .set(&self.active, ingredient.id.as_str(), to_fields(ingredient)?)
            .await
    }

    pub async fn put_trash(&self, item: &TrashedIngredient) -> Result<(), RemoteError> {
        self.store
            .set(&self.trash, item.ingredient.id.as_str(), to_fields(item)?)
            .await
    }

    /// Copy a trash record under a store-assigned id.
    pub async fn create_trash(&self, item: TrashedIngredient) -> Result<TrashedIngredient, RemoteError> {
        let mut item = item;
        item.ingredient.id = IngredientId::from(self.store.allocate_id());
        self.put_trash(&item).await?;
        Ok(item)
    }

    pub async fn update_active(&self, id: &IngredientId, patch: &IngredientPatch) -> Result<(), RemoteError> {
        self.store
            .update(&self.active, id.as_str(), patch.to_fields())
            .await
    }

    pub async fn delete_active(&self, id: &IngredientId) -> Result<(), RemoteError> {
        self.store.delete(&self.active, id.as_str()).await
    }

    pub async fn delete_trash(&self, id: &IngredientId) -> Result<(), RemoteError> {
        self.store.delete(&self.trash, id.as_str()).await
    }
}
