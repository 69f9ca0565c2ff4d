//! Local-mode pantry persistence on top of a [`KeyValueStore`].
//!
//! Each collection is one JSON array under a fixed key, rewritten in full on
//! every save.

use std::sync::Arc;

use larder_pantry::{Ingredient, ShoppingList, TrashedIngredient};

use crate::kv::{KeyValueStore, StorageError, get_json, set_json};

pub const ACTIVE_KEY: &str = "myPantryIngredients";
pub const TRASH_KEY: &str = "myPantryTrash";
pub const SHOPPING_KEY: &str = "myShoppingList";

#[derive(Clone)]
pub struct LocalPantryStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalPantryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn key_value(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Active items, newest first as stored. A missing key is an empty list.
    pub async fn load_active(&self) -> Result<Vec<Ingredient>, StorageError> {
        Ok(get_json(self.kv.as_ref(), ACTIVE_KEY).await?.unwrap_or_default())
    }

    pub async fn save_active(&self, items: &[Ingredient]) -> Result<(), StorageError> {
        set_json(self.kv.as_ref(), ACTIVE_KEY, &items).await
    }

    /// Drop the active collection key entirely.
    pub async fn clear_active(&self) -> Result<(), StorageError> {
        self.kv.remove(ACTIVE_KEY).await
    }

    pub async fn load_trash(&self) -> Result<Vec<TrashedIngredient>, StorageError> {
        Ok(get_json(self.kv.as_ref(), TRASH_KEY).await?.unwrap_or_default())
    }

    pub async fn save_trash(&self, items: &[TrashedIngredient]) -> Result<(), StorageError> {
        set_json(self.kv.as_ref(), TRASH_KEY, &items).await
    }

    pub async fn clear_trash(&self) -> Result<(), StorageError> {
        self.kv.remove(TRASH_KEY).await
    }

    pub async fn load_shopping(&self) -> Result<ShoppingList, StorageError> {
        Ok(get_json(self.kv.as_ref(), SHOPPING_KEY).await?.unwrap_or_default())
    }

    pub async fn save_shopping(&self, list: &ShoppingList) -> Result<(), StorageError> {
        set_json(self.kv.as_ref(), SHOPPING_KEY, list).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use larder_core::IngredientId;
    use larder_pantry::{Category, NewIngredient};

    use super::*;
    use crate::kv::InMemoryKeyValueStore;

    fn store() -> (LocalPantryStore, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (LocalPantryStore::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn missing_keys_load_as_empty() {
        let (store, _) = store();
        assert!(store.load_active().await.unwrap().is_empty());
        assert!(store.load_trash().await.unwrap().is_empty());
        assert!(store.load_shopping().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_round_trip_under_their_keys() {
        let (store, kv) = store();
        let milk = NewIngredient::new("Whole Milk", Category::Dairy)
            .into_ingredient(IngredientId::generate(), Utc::now());
        store.save_active(std::slice::from_ref(&milk)).await.unwrap();
        store
            .save_trash(&[milk.clone().into_trash(Utc::now())])
            .await
            .unwrap();

        assert_eq!(store.load_active().await.unwrap(), vec![milk.clone()]);
        assert_eq!(store.load_trash().await.unwrap()[0].ingredient.id, milk.id);
        assert_eq!(kv.keys(), vec![ACTIVE_KEY.to_string(), TRASH_KEY.to_string()]);

        store.clear_active().await.unwrap();
        assert_eq!(kv.keys(), vec![TRASH_KEY.to_string()]);
    }

    #[tokio::test]
    async fn legacy_records_with_numeric_ids_load() {
        let (store, kv) = store();
        kv.set(ACTIVE_KEY, r#"[{"id": 1700000000000, "name": "Eggs", "category": "Dairy"}]"#)
            .await
            .unwrap();

        let items = store.load_active().await.unwrap();
        assert_eq!(items[0].id.as_str(), "1700000000000");
        assert_eq!(items[0].name, "Eggs");
    }
}
