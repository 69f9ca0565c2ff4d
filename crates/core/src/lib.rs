//! `larder-core` — shared building blocks for the larder workspace.
//!
//! This crate contains **pure** primitives (no storage, no network).

pub mod entity;
pub mod error;
pub mod id;
pub mod interaction;
pub mod units;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{IngredientId, UserId};
pub use interaction::{Headless, Interaction};
pub use units::UnitSystem;
