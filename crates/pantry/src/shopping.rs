//! Shopping list: entries auto-filed by keyword, checked off, then stocked
//! into the fridge.

use serde::{Deserialize, Serialize};

use larder_core::{Entity, IngredientId};

use crate::category::Category;
use crate::ingredient::{NewIngredient, Status};

/// One line on the shopping list.
///
/// `checked` only ever lives on this device; it is never written to the
/// document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: IngredientId,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub checked: bool,
}

impl ShoppingItem {
    /// The ingredient this entry becomes once bought.
    pub fn to_new_ingredient(&self) -> NewIngredient {
        let category = match self.category {
            Category::Unsorted => Category::Pantry,
            other => other,
        };
        NewIngredient::new(self.name.clone(), category)
            .with_expiry(NewIngredient::DEFAULT_EXPIRY)
            .with_status(Status::Fresh)
    }
}

impl Entity for ShoppingItem {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShoppingList {
    items: Vec<ShoppingItem>,
}

impl ShoppingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ShoppingItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an entry. Blank names are ignored.
    pub fn add(&mut self, name: &str) -> Option<&ShoppingItem> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.items.push(ShoppingItem {
            id: IngredientId::generate(),
            name: name.to_string(),
            category: Category::classify(name),
            checked: false,
        });
        self.items.last()
    }

    /// Flip the checked flag. Returns the new value, or `None` if absent.
    pub fn toggle(&mut self, id: &IngredientId) -> Option<bool> {
        let item = self.items.iter_mut().find(|i| &i.id == id)?;
        item.checked = !item.checked;
        Some(item.checked)
    }

    pub fn remove(&mut self, id: &IngredientId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.id != id);
        self.items.len() != before
    }

    pub fn checked(&self) -> impl Iterator<Item = &ShoppingItem> {
        self.items.iter().filter(|i| i.checked)
    }

    /// Remove and return every checked entry, preserving list order.
    pub fn take_checked(&mut self) -> Vec<ShoppingItem> {
        let (checked, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|i| i.checked);
        self.items = rest;
        checked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_classifies_and_trims() {
        let mut list = ShoppingList::new();
        let item = list.add("  Parmigiano Reggiano ").cloned();
        let item = item.expect("item added");
        assert_eq!(item.name, "Parmigiano Reggiano");
        // "reggiano" contains "egg"; the keyword table is a plain substring match.
        assert_eq!(item.category, Category::Dairy);

        assert_eq!(list.add("Fresh Basil").map(|i| i.category), Some(Category::Veggies));
        assert!(list.add("   ").is_none());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn take_checked_leaves_unchecked_entries() {
        let mut list = ShoppingList::new();
        let basil = list.add("Fresh Basil").map(|i| i.id.clone()).unwrap();
        list.add("Wagyu Beef");
        assert_eq!(list.toggle(&basil), Some(true));

        let taken = list.take_checked();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].name, "Fresh Basil");
        assert_eq!(list.len(), 1);
        assert_eq!(list.checked().count(), 0);
    }

    #[test]
    fn unsorted_entries_are_stocked_as_pantry_goods() {
        let item = ShoppingItem {
            id: IngredientId::from("s1"),
            name: "Kombucha".to_string(),
            category: Category::Unsorted,
            checked: true,
        };
        let new = item.to_new_ingredient();
        assert_eq!(new.category, Category::Pantry);
        assert_eq!(new.expiry.as_deref(), Some("Fresh"));
        assert_eq!(new.status, Some(Status::Fresh));
    }

    #[test]
    fn toggle_and_remove_unknown_ids() {
        let mut list = ShoppingList::new();
        let missing = IngredientId::from("missing");
        assert_eq!(list.toggle(&missing), None);
        assert!(!list.remove(&missing));
    }
}
