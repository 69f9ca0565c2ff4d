//! Recipe generation entry point used by the client.

use std::sync::Arc;

use async_trait::async_trait;
use larder_core::Interaction;

use crate::error::AiError;
use crate::prompt::RecipeRequest;
use crate::recipe::{Recipe, parse_recipes};

/// A hosted (or fake) model that turns a prompt into raw text.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// Builds the prompt, calls the model once and validates the answer.
///
/// `model` is `None` when no API key is configured; every request then fails
/// with [`AiError::NotConfigured`].
#[derive(Clone)]
pub struct RecipeAssistant {
    model: Option<Arc<dyn TextModel>>,
    interaction: Arc<dyn Interaction>,
}

impl RecipeAssistant {
    pub fn new(model: Option<Arc<dyn TextModel>>, interaction: Arc<dyn Interaction>) -> Self {
        Self { model, interaction }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Generate recipes, reporting the failure reason.
    pub async fn try_generate(&self, request: &RecipeRequest) -> Result<Vec<Recipe>, AiError> {
        if request.is_empty() {
            return Ok(Vec::new());
        }
        request.validate()?;
        let model = self.model.as_ref().ok_or(AiError::NotConfigured)?;

        let text = model.generate(&request.to_prompt()).await?;
        let recipes = parse_recipes(&text)?;
        tracing::info!("Generated {} recipes", recipes.len());
        Ok(recipes)
    }

    /// Generate recipes for display. Any failure is shown to the user as an
    /// alert and yields an empty list.
    pub async fn generate(&self, request: &RecipeRequest) -> Vec<Recipe> {
        match self.try_generate(request).await {
            Ok(recipes) => recipes,
            Err(e) => {
                tracing::error!("Recipe generation failed: {}", e);
                self.interaction
                    .alert(&format!("Could not generate recipes: {e}"));
                Vec::new()
            }
        }
    }
}
