//! Pantry domain module.
//!
//! This crate contains the records and rules of the fridge, the trash and the
//! shopping list, implemented purely as deterministic domain logic (no IO, no
//! storage, no network).

pub mod category;
pub mod ingredient;
pub mod scan;
pub mod shopping;

pub use category::Category;
pub use ingredient::{Ingredient, IngredientPatch, NewIngredient, Status, TrashedIngredient};
pub use scan::{Confidence, Detection};
pub use shopping::{ShoppingItem, ShoppingList};
