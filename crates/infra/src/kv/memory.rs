use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{KeyValueStore, StorageError};

/// In-memory key-value store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned() -> StorageError {
    StorageError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{get_json, set_json};

    #[tokio::test]
    async fn set_overwrites_and_remove_is_idempotent() {
        let kv = InMemoryKeyValueStore::new();
        kv.set("a", "1").await.unwrap();
        kv.set("a", "2").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));

        kv.remove("a").await.unwrap();
        kv.remove("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_json_is_reported_with_its_key() {
        let kv = InMemoryKeyValueStore::new();
        kv.set("list", "{oops").await.unwrap();

        let err = get_json::<Vec<u32>>(&kv, "list").await.unwrap_err();
        assert!(matches!(err, StorageError::Malformed { ref key, .. } if key == "list"));

        set_json(&kv, "list", &vec![1u32, 2]).await.unwrap();
        assert_eq!(get_json::<Vec<u32>>(&kv, "list").await.unwrap(), Some(vec![1, 2]));
    }
}
