//! SQLite-backed key-value store (local persistence between runs).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::Mutex;

use super::{KeyValueStore, StorageError};

const DB_FILE: &str = "larder.db";

/// Key-value store in a single SQLite table.
///
/// The pool is opened lazily on first use, so constructing the store never
/// touches the filesystem.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    options: SqliteConnectOptions,
    max_connections: u32,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteKeyValueStore {
    /// Store backed by the database file at `path` (created if missing).
    pub fn open(path: impl AsRef<Path>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::with_options(options, 4)
    }

    /// Store backed by `larder.db` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::open(dir.as_ref().join(DB_FILE))
    }

    /// Private in-memory database; data disappears with the store.
    pub fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database.
        Ok(Self::with_options(options, 1))
    }

    fn with_options(options: SqliteConnectOptions, max_connections: u32) -> Self {
        Self {
            options,
            max_connections,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    async fn pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let filename = self.options.get_filename();
        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!("failed to create data directory {parent:?}: {e}"))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(self.options.clone())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!("Opened key-value store at {:?}", filename);
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await?;
        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }
}

/// Default data directory: `<OS data dir>/larder`.
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or_else(|| StorageError::Backend("failed to resolve OS app data directory".to_string()))?;
    dir.push("larder");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_survive_reopening_the_pool_handle() {
        let kv = SqliteKeyValueStore::in_memory().unwrap();
        assert_eq!(kv.get("myPantryIngredients").await.unwrap(), None);

        kv.set("myPantryIngredients", "[]").await.unwrap();
        kv.set("myPantryIngredients", "[1]").await.unwrap();

        let clone = kv.clone();
        assert_eq!(clone.get("myPantryIngredients").await.unwrap().as_deref(), Some("[1]"));

        clone.remove("myPantryIngredients").await.unwrap();
        assert_eq!(kv.get("myPantryIngredients").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_database_persists_across_stores() {
        let dir = std::env::temp_dir().join(format!("larder-kv-{}", uuid::Uuid::now_v7()));
        {
            let kv = SqliteKeyValueStore::in_dir(&dir);
            kv.set("currentUser", "{\"name\":\"Ada\"}").await.unwrap();
        }
        let reopened = SqliteKeyValueStore::in_dir(&dir);
        assert_eq!(
            reopened.get("currentUser").await.unwrap().as_deref(),
            Some("{\"name\":\"Ada\"}")
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
