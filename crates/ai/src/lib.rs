//! `larder-ai`
//!
//! **Responsibility:** recipe suggestions from a hosted text-generation model.
//!
//! This crate is intentionally **not** part of the pantry model:
//! - It must not depend on pantry records or storage.
//! - It takes plain ingredient names and preferences, and returns validated
//!   recipe values.
//! - Model output is untrusted text; it is parsed into a strict schema or
//!   rejected as a whole.

pub mod assistant;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod recipe;

pub use assistant::{RecipeAssistant, TextModel};
pub use error::AiError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use prompt::RecipeRequest;
pub use recipe::{Difficulty, Recipe, RecipeIngredient, parse_recipes};
