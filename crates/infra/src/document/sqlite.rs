//! SQLite-backed document store, the durable stand-in for the hosted
//! datastore used by the CLI's cloud mode.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::{Mutex, watch};

use super::{Document, DocumentStore, Fields, RemoteError, Snapshot};

const DB_FILE: &str = "cloud.db";

impl From<sqlx::Error> for RemoteError {
    fn from(err: sqlx::Error) -> Self {
        RemoteError::Unavailable(err.to_string())
    }
}

/// Documents in one SQLite table keyed by `(collection, id)`.
///
/// Like [`super::InMemoryDocumentStore`], every write is published to the
/// collection's watchers before the call returns. The pool is opened lazily.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    options: SqliteConnectOptions,
    max_connections: u32,
    pool: Arc<Mutex<Option<SqlitePool>>>,
    watchers: Arc<Mutex<HashMap<String, watch::Sender<Vec<Document>>>>>,
}

impl SqliteDocumentStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::with_options(options, 4)
    }

    /// Store backed by `cloud.db` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::open(dir.as_ref().join(DB_FILE))
    }

    pub fn in_memory() -> Result<Self, RemoteError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Ok(Self::with_options(options, 1))
    }

    fn with_options(options: SqliteConnectOptions, max_connections: u32) -> Self {
        Self {
            options,
            max_connections,
            pool: Arc::new(Mutex::new(None)),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn pool(&self) -> Result<SqlitePool, RemoteError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let filename = self.options.get_filename();
        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RemoteError::Unavailable(format!("failed to create data directory {parent:?}: {e}"))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(self.options.clone())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                fields     TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!("Opened document store at {:?}", filename);
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn snapshot(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id")
            .bind(collection)
            .fetch_all(&pool)
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let raw: String = row.try_get("fields")?;
            match decode_fields(&id, &raw) {
                Ok(fields) => docs.push(Document { id, fields }),
                Err(e) => tracing::warn!("Skipping stored document in {}: {}", collection, e),
            }
        }
        Ok(docs)
    }

    /// Push the current contents of `collection` to its watchers, if any.
    async fn publish(&self, collection: &str) -> Result<(), RemoteError> {
        let watchers = self.watchers.lock().await;
        if let Some(tx) = watchers.get(collection) {
            let docs = self.snapshot(collection).await?;
            tx.send_replace(docs);
        }
        Ok(())
    }
}

fn decode_fields(id: &str, raw: &str) -> Result<Fields, RemoteError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(RemoteError::Malformed {
            id: id.to_string(),
            reason: "fields are not a JSON object".to_string(),
        }),
        Err(e) => Err(RemoteError::Malformed {
            id: id.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn encode_fields(id: &str, fields: &Fields) -> Result<String, RemoteError> {
    serde_json::to_string(fields).map_err(|e| RemoteError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn allocate_id(&self) -> String {
        format!("doc-{}", uuid::Uuid::now_v7().simple())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection, id) DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(encode_fields(id, &fields)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await?;
        self.publish(collection).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        let row = sqlx::query("SELECT fields FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        let raw: String = row.try_get("fields")?;
        let mut merged = decode_fields(id, &raw)?;
        merged.extend(fields);

        sqlx::query("UPDATE documents SET fields = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .bind(encode_fields(id, &merged)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.publish(collection).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let pool = self.pool().await?;
        let deleted = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            self.publish(collection).await?;
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT fields FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let raw: String = row.try_get("fields")?;
                Ok(Some(Document {
                    id: id.to_string(),
                    fields: decode_fields(id, &raw)?,
                }))
            }
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        self.snapshot(collection).await
    }

    async fn watch(&self, collection: &str) -> Result<Snapshot, RemoteError> {
        // Held across the initial read so no write slips in between the
        // snapshot and the registration.
        let mut watchers = self.watchers.lock().await;
        if let Some(tx) = watchers.get(collection) {
            return Ok(tx.subscribe());
        }
        let docs = self.snapshot(collection).await?;
        let (tx, rx) = watch::channel(docs);
        watchers.insert(collection.to_string(), tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(v: Value) -> Fields {
        match v {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[tokio::test]
    async fn writes_reach_watchers_and_merge() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let rx = store.watch("users/u1/ingredients").await.unwrap();
        assert!(rx.borrow().is_empty());

        let id = store
            .add("users/u1/ingredients", fields(json!({ "name": "Eggs" })))
            .await
            .unwrap();
        assert_eq!(rx.borrow()[0].id, id);

        store
            .update("users/u1/ingredients", &id, fields(json!({ "expiry": "2 days" })))
            .await
            .unwrap();
        let doc = store.get("users/u1/ingredients", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], "Eggs");
        assert_eq!(rx.borrow()[0].fields["expiry"], "2 days");

        store.delete("users/u1/ingredients", &id).await.unwrap();
        store.delete("users/u1/ingredients", &id).await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let err = store.update("c", "nope", Fields::new()).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn collections_are_separate() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.set("users/a/trash", "1", fields(json!({ "name": "Kale" }))).await.unwrap();
        store.set("users/b/trash", "1", fields(json!({ "name": "Tofu" }))).await.unwrap();

        let a = store.list("users/a/trash").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].fields["name"], "Kale");
    }

    #[tokio::test]
    async fn documents_survive_reopening_the_file() {
        let dir = std::env::temp_dir().join(format!("larder-docs-{}", uuid::Uuid::now_v7()));
        {
            let store = SqliteDocumentStore::in_dir(&dir);
            store
                .set("users/u1/ingredients", "doc-1", fields(json!({ "name": "Eggs" })))
                .await
                .unwrap();
        }
        let reopened = SqliteDocumentStore::in_dir(&dir);
        let rx = reopened.watch("users/u1/ingredients").await.unwrap();
        assert_eq!(rx.borrow()[0].fields["name"], "Eggs");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
