//! Local-mode accounts kept in the key-value store.
//!
//! Accounts live under `users` as a JSON array; the signed-in session under
//! `currentUser`. Passwords are stored as salted digests.

use std::sync::Arc;

use async_trait::async_trait;
use larder_auth::{AuthError, IdentityProvider, UserSession};
use larder_core::UserId;
use serde::{Deserialize, Serialize};

use super::PasswordHash;
use crate::kv::{KeyValueStore, StorageError, get_json, set_json};

pub const USERS_KEY: &str = "users";
pub const CURRENT_USER_KEY: &str = "currentUser";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    #[serde(flatten)]
    profile: UserSession,
    password: PasswordHash,
}

fn storage(err: StorageError) -> AuthError {
    AuthError::Storage(err.to_string())
}

#[derive(Clone)]
pub struct LocalIdentityProvider {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalIdentityProvider {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn accounts(&self) -> Result<Vec<Account>, AuthError> {
        Ok(get_json(self.kv.as_ref(), USERS_KEY)
            .await
            .map_err(storage)?
            .unwrap_or_default())
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), AuthError> {
        set_json(self.kv.as_ref(), USERS_KEY, &accounts).await.map_err(storage)
    }

    async fn set_current(&self, session: &UserSession) -> Result<(), AuthError> {
        set_json(self.kv.as_ref(), CURRENT_USER_KEY, session).await.map_err(storage)
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn restore(&self) -> Result<Option<UserSession>, AuthError> {
        match get_json(self.kv.as_ref(), CURRENT_USER_KEY).await {
            Ok(session) => Ok(session),
            Err(StorageError::Malformed { .. }) => {
                tracing::warn!("Discarding unreadable stored session");
                self.kv.remove(CURRENT_USER_KEY).await.map_err(storage)?;
                Ok(None)
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserSession, AuthError> {
        let mut accounts = self.accounts().await?;
        if accounts.iter().any(|a| same_email(&a.profile.email, email)) {
            return Err(AuthError::EmailTaken);
        }

        let session = UserSession::new(UserId::new(), name, email);
        accounts.push(Account {
            profile: session.clone(),
            password: PasswordHash::new(password),
        });
        self.save_accounts(&accounts).await?;
        self.set_current(&session).await?;
        tracing::info!("Registered local account {}", session.id);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        let accounts = self.accounts().await?;
        let account = accounts
            .into_iter()
            .find(|a| same_email(&a.profile.email, email) && a.password.verify(password))
            .ok_or(AuthError::InvalidCredentials)?;
        self.set_current(&account.profile).await?;
        Ok(account.profile)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.kv.remove(CURRENT_USER_KEY).await.map_err(storage)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let accounts = self.accounts().await?;
        if !accounts.iter().any(|a| same_email(&a.profile.email, email)) {
            return Err(AuthError::UnknownEmail);
        }
        // There is no mail channel in local mode.
        tracing::info!("Password reset requested for local account; nothing to send");
        Ok(())
    }

    async fn save_profile(&self, session: &UserSession) -> Result<UserSession, AuthError> {
        let mut accounts = self.accounts().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.profile.id == session.id)
            .ok_or(AuthError::NotAuthenticated)?;
        account.profile = session.clone();
        self.save_accounts(&accounts).await?;
        self.set_current(session).await?;
        Ok(session.clone())
    }

    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), AuthError> {
        let mut accounts = self.accounts().await?;
        let account = accounts
            .iter_mut()
            .find(|a| same_email(&a.profile.email, email))
            .ok_or(AuthError::UnknownEmail)?;
        if !account.password.verify(current) {
            return Err(AuthError::InvalidCredentials);
        }
        account.password = PasswordHash::new(new);
        self.save_accounts(&accounts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKeyValueStore;

    fn provider() -> (LocalIdentityProvider, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (LocalIdentityProvider::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn sign_up_persists_session_and_rejects_duplicates() {
        let (provider, kv) = provider();
        let ada = provider.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();

        assert_eq!(provider.restore().await.unwrap(), Some(ada));
        assert_eq!(
            provider.sign_up("Ada 2", "ADA@example.com", "secret2").await,
            Err(AuthError::EmailTaken)
        );

        let raw = kv.get(USERS_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("secret1"));
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let (provider, _) = provider();
        provider.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();
        provider.sign_out().await.unwrap();
        assert_eq!(provider.restore().await.unwrap(), None);

        assert_eq!(
            provider.sign_in("ada@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(provider.sign_in("ada@example.com", "secret1").await.unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let (provider, _) = provider();
        provider.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();

        assert_eq!(
            provider.change_password("ada@example.com", "nope", "secret2").await,
            Err(AuthError::InvalidCredentials)
        );
        provider.change_password("ada@example.com", "secret1", "secret2").await.unwrap();
        assert!(provider.sign_in("ada@example.com", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn profile_edits_reach_both_records() {
        let (provider, _) = provider();
        let mut ada = provider.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();
        ada.dietary_restrictions = vec!["Vegan".to_string()];
        provider.save_profile(&ada).await.unwrap();

        assert_eq!(provider.restore().await.unwrap().unwrap().dietary_restrictions, vec!["Vegan"]);
        provider.sign_out().await.unwrap();
        let again = provider.sign_in("ada@example.com", "secret1").await.unwrap();
        assert_eq!(again.dietary_restrictions, vec!["Vegan"]);
    }

    #[tokio::test]
    async fn corrupt_session_is_discarded() {
        let (provider, kv) = provider();
        kv.set(CURRENT_USER_KEY, "not json").await.unwrap();
        assert_eq!(provider.restore().await.unwrap(), None);
        assert_eq!(kv.get(CURRENT_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_for_unknown_email_fails() {
        let (provider, _) = provider();
        assert_eq!(
            provider.send_password_reset("ghost@example.com").await,
            Err(AuthError::UnknownEmail)
        );
    }
}
