//! Application wiring: one explicit state object per running client.
//!
//! `Larder` owns the auth controller, the pantry controller and the recipe
//! assistant, and moves the pantry between local storage and the cloud
//! collections as the session changes.

use std::sync::Arc;

use larder_ai::{GeminiClient, Recipe, RecipeAssistant, RecipeRequest, TextModel};
use larder_auth::{AuthController, AuthError, AuthState, IdentityProvider, ProfilePatch, UserSession};
use larder_core::Interaction;
use larder_infra::{
    DocumentStore, HostedIdentityProvider, KeyValueStore, LocalIdentityProvider,
    LocalPantryStore, RemotePantryStore, SqliteDocumentStore, SqliteKeyValueStore,
};
use thiserror::Error;

use crate::config::{AuthMode, ClientConfig};
use crate::controller::{PantryController, PantryError};
use crate::migration::{MigrationReport, migrate_local_to_remote};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Pantry(#[from] PantryError),
}

/// Backing services, injectable for tests.
pub struct Services {
    pub kv: Arc<dyn KeyValueStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub model: Option<Arc<dyn TextModel>>,
    pub interaction: Arc<dyn Interaction>,
}

pub struct Larder {
    mode: AuthMode,
    auth: AuthController,
    pantry: PantryController,
    local: LocalPantryStore,
    documents: Arc<dyn DocumentStore>,
    assistant: RecipeAssistant,
}

impl Larder {
    /// Build from configuration. Local data and the cloud collections both
    /// live in SQLite files under the data directory, so a migrated pantry
    /// is still there on the next run.
    pub async fn from_config(
        config: &ClientConfig,
        interaction: Arc<dyn Interaction>,
    ) -> Result<Self, AppError> {
        let model: Option<Arc<dyn TextModel>> = match &config.gemini {
            Some(gemini) => match GeminiClient::new(gemini.clone()) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn TextModel>),
                Err(e) => {
                    tracing::warn!("Recipe generation unavailable: {}", e);
                    None
                }
            },
            None => None,
        };
        let services = Services {
            kv: Arc::new(SqliteKeyValueStore::in_dir(&config.data_dir)),
            documents: Arc::new(SqliteDocumentStore::in_dir(&config.data_dir)),
            model,
            interaction,
        };
        Self::start(config.auth_mode, services).await
    }

    /// Restore the previous session and attach the matching pantry backend.
    pub async fn start(mode: AuthMode, services: Services) -> Result<Self, AppError> {
        let local = LocalPantryStore::new(services.kv.clone());
        let provider: Arc<dyn IdentityProvider> = match mode {
            AuthMode::Local => Arc::new(LocalIdentityProvider::new(services.kv.clone())),
            AuthMode::Cloud => Arc::new(HostedIdentityProvider::new(
                services.documents.clone(),
                services.kv.clone(),
            )),
        };
        let pantry = PantryController::load(local.clone(), services.interaction.clone()).await?;

        let mut app = Self {
            mode,
            auth: AuthController::new(provider),
            pantry,
            local,
            documents: services.documents,
            assistant: RecipeAssistant::new(services.model, services.interaction),
        };

        if let AuthState::Authenticated(user) = app.auth.restore().await {
            app.on_signed_in(&user).await?;
        }
        Ok(app)
    }

    pub fn auth(&self) -> &AuthController {
        &self.auth
    }

    pub fn pantry(&self) -> &PantryController {
        &self.pantry
    }

    pub fn pantry_mut(&mut self) -> &mut PantryController {
        &mut self.pantry
    }

    pub fn assistant(&self) -> &RecipeAssistant {
        &self.assistant
    }

    pub async fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(UserSession, Option<MigrationReport>), AppError> {
        let user = self.auth.sign_up(name, email, password).await?;
        let report = self.on_signed_in(&user).await?;
        Ok((user, report))
    }

    pub async fn log_in(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<(UserSession, Option<MigrationReport>), AppError> {
        let user = self.auth.log_in(email, password).await?;
        let report = self.on_signed_in(&user).await?;
        Ok((user, report))
    }

    /// Sign out and hand the pantry back to local storage, even when the
    /// provider reports a failure.
    pub async fn log_out(&mut self) -> Result<(), AppError> {
        let result = self.auth.log_out().await;
        self.pantry.detach_remote().await?;
        Ok(result?)
    }

    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<(), AppError> {
        let pending = self.auth.update_profile(patch)?;
        match pending.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(AuthError::Provider(format!("profile save task failed: {e}")).into()),
        }
    }

    /// Recipes for `selected` ingredients using the signed-in user's
    /// preferences. Failures were already shown to the user.
    pub async fn recipes(&self, selected: Vec<String>, cravings: &str) -> Vec<Recipe> {
        let request = self.recipe_request(selected, cravings);
        self.assistant.generate(&request).await
    }

    pub fn recipe_request(&self, selected: Vec<String>, cravings: &str) -> RecipeRequest {
        let mut request = RecipeRequest::new(selected).with_cravings(cravings);
        if let Some(user) = self.auth.current_user() {
            request = request
                .with_dietary_restrictions(user.dietary_restrictions.clone())
                .with_units(user.units());
            if let Some(language) = user.language {
                request = request.with_language(language);
            }
        }
        request
    }

    /// Cloud sessions get the local data migrated and the live collections
    /// attached; local sessions keep the pantry where it is.
    async fn on_signed_in(&mut self, user: &UserSession) -> Result<Option<MigrationReport>, AppError> {
        if self.mode == AuthMode::Local {
            return Ok(None);
        }
        let remote = RemotePantryStore::new(self.documents.clone(), &user.id);
        let report = migrate_local_to_remote(&self.local, &remote).await?;
        self.pantry.attach_remote(user.id, remote).await?;
        Ok(Some(report))
    }
}
