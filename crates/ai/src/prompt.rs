//! Prompt construction for recipe generation.

use std::fmt::Write as _;

use larder_core::UnitSystem;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Number of recipes the model is asked for.
pub const RECIPE_COUNT: usize = 3;

/// Longest free-text cravings accepted, in characters.
pub const MAX_CRAVINGS_LEN: usize = 500;

/// Everything the user chose on the recipe screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub cravings: String,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub units: UnitSystem,
    /// BCP-47 tag of the UI language, e.g. `en` or `ko`.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl RecipeRequest {
    pub fn new(ingredients: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ingredients: ingredients.into_iter().map(Into::into).collect(),
            language: default_language(),
            ..Self::default()
        }
    }

    pub fn with_cravings(mut self, cravings: impl Into<String>) -> Self {
        self.cravings = cravings.into();
        self
    }

    pub fn with_dietary_restrictions(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dietary_restrictions = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn selected(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// Nothing selected and nothing craved.
    pub fn is_empty(&self) -> bool {
        self.selected().next().is_none() && self.cravings.trim().is_empty()
    }

    /// Reject requests the prompt cannot carry.
    pub fn validate(&self) -> Result<(), AiError> {
        let len = self.cravings.trim().chars().count();
        if len > MAX_CRAVINGS_LEN {
            return Err(AiError::InvalidInput(format!(
                "cravings are {len} characters long, at most {MAX_CRAVINGS_LEN} are allowed"
            )));
        }
        if self.language.trim().is_empty() {
            return Err(AiError::InvalidInput("language tag cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Render the single prompt string sent to the model.
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are a professional chef. Suggest exactly {RECIPE_COUNT} recipes."
        );

        let selected: Vec<&str> = self.selected().collect();
        if selected.is_empty() {
            let _ = writeln!(prompt, "The user has not selected any ingredients.");
        } else {
            let _ = writeln!(prompt, "Available ingredients: {}.", selected.join(", "));
        }

        let cravings = self.cravings.trim();
        if !cravings.is_empty() {
            let _ = writeln!(prompt, "The user is craving: {cravings}.");
        }

        let tags: Vec<&str> = self
            .dietary_restrictions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !tags.is_empty() {
            let _ = writeln!(prompt, "Every recipe must respect these dietary restrictions: {}.", tags.join(", "));
        }

        let _ = writeln!(prompt, "Use {} units for all quantities.", self.units.as_str());
        let _ = writeln!(prompt, "Write all text in the language with tag \"{}\".", self.language.trim());
        prompt.push_str(
            "Respond with only a JSON array, no commentary. Each element must have: \
             \"title\" (string), \"time\" (string such as \"25m\"), \
             \"difficulty\" (\"Easy\", \"Medium\" or \"Hard\"), \
             \"match\" (integer 0-100, how well it uses the available ingredients), \
             \"image\" (URL string), \"description\" (string), \
             \"steps\" (array of strings), \
             \"stepTimers\" (array of integer minutes, same length as steps, 0 for no timer), \
             \"stepTips\" (array of strings, same length as steps), \
             \"ingredients\" (array of {\"name\": string, \"available\": boolean}).",
        );
        prompt
    }
}
