//! Session state machine: `Loading -> {Authenticated | Anonymous}`.
//!
//! Transitions happen only through `restore`, `sign_up`, `log_in` and
//! `log_out`. Profile edits are applied to the in-memory session first and
//! persisted in the background.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::provider::{AuthError, IdentityProvider};
use crate::session::{ProfilePatch, UserSession};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Authenticated(UserSession),
    Anonymous,
}

impl AuthState {
    pub fn user(&self) -> Option<&UserSession> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

pub struct AuthController {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<AuthState>>,
    /// Bumped on every local profile edit; a background save only publishes
    /// the provider's copy if no newer edit happened meanwhile.
    profile_revision: Arc<AtomicU64>,
}

impl AuthController {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            provider,
            state: Arc::new(state),
            profile_revision: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<UserSession> {
        self.state.borrow().user().cloned()
    }

    /// Observe session transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Initial session restore. Provider failures leave the user signed out.
    pub async fn restore(&self) -> AuthState {
        let next = match self.provider.restore().await {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, "restored session");
                AuthState::Authenticated(user)
            }
            Ok(None) => AuthState::Anonymous,
            Err(e) => {
                tracing::warn!("session restore failed: {e}");
                AuthState::Anonymous
            }
        };
        self.state.send_replace(next.clone());
        next
    }

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserSession, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Validation("name cannot be empty".to_string()));
        }
        validate_email(email)?;
        validate_password(password)?;

        let user = self.provider.sign_up(name.trim(), &normalize_email(email), password).await?;
        tracing::info!(user_id = %user.id, "signed up");
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        validate_email(email)?;
        let user = self.provider.sign_in(&normalize_email(email), password).await?;
        tracing::info!(user_id = %user.id, "logged in");
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    /// Always ends signed out locally; a provider failure is reported after
    /// the local transition.
    pub async fn log_out(&self) -> Result<(), AuthError> {
        let result = self.provider.sign_out().await;
        self.state.send_replace(AuthState::Anonymous);
        self.profile_revision.fetch_add(1, Ordering::SeqCst);
        tracing::info!("logged out");
        result
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        self.provider.send_password_reset(&normalize_email(email)).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), AuthError> {
        let user = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        validate_password(new)?;
        self.provider.change_password(&user.email, current, new).await
    }

    /// Apply `patch` to the session immediately and persist it in the
    /// background. The returned handle resolves once the provider answered.
    pub fn update_profile(&self, patch: ProfilePatch) -> Result<JoinHandle<Result<(), AuthError>>, AuthError> {
        let mut user = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(AuthError::Validation("name cannot be empty".to_string()));
            }
        }
        patch.apply(&mut user);

        let revision = self.profile_revision.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(AuthState::Authenticated(user.clone()));

        let provider = self.provider.clone();
        let state = self.state.clone();
        let revisions = self.profile_revision.clone();
        Ok(tokio::spawn(async move {
            match provider.save_profile(&user).await {
                Ok(stored) => {
                    if revisions.load(Ordering::SeqCst) == revision {
                        state.send_if_modified(|s| match s {
                            AuthState::Authenticated(current) if current.id == stored.id => {
                                let changed = *current != stored;
                                *current = stored;
                                changed
                            }
                            _ => false,
                        });
                    } else {
                        tracing::debug!(revision, "discarding stale profile save result");
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(user_id = %user.id, "profile save failed: {e}");
                    Err(e)
                }
            }
        }))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Validation("invalid email format".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
