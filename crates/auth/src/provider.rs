//! Identity provider abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::session::UserSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("no account for this email")]
    UnknownEmail,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport or service failure talking to the provider.
    #[error("identity provider unavailable: {0}")]
    Provider(String),

    /// Failure reading or writing the local credential/session store.
    #[error("credential storage failed: {0}")]
    Storage(String),
}

/// Backend that owns accounts and the persisted session.
///
/// Implementations: a local credential list in the key-value store, and the
/// hosted identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Session persisted from a previous run, if any.
    async fn restore(&self) -> Result<Option<UserSession>, AuthError>;

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Persist profile fields; returns the provider's stored copy.
    async fn save_profile(&self, session: &UserSession) -> Result<UserSession, AuthError>;

    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), AuthError>;
}
