//! Emulation of the hosted identity service.
//!
//! Credentials and profiles are documents in the shared [`DocumentStore`]:
//! `credentials/{email}` holds the account id and password digest,
//! `users/{uid}` the profile next to the pantry data. The signed-in session
//! is kept on the device in the key-value store, so it survives restarts.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use larder_auth::{AuthError, IdentityProvider, UserSession};
use larder_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PasswordHash;
use crate::document::{DocumentStore, Fields, RemoteError};
use crate::kv::{KeyValueStore, StorageError, get_json, set_json};

pub const PROFILES_COLLECTION: &str = "users";
pub const CREDENTIALS_COLLECTION: &str = "credentials";
pub const SESSION_KEY: &str = "hostedSession";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    uid: UserId,
    password: PasswordHash,
}

pub struct HostedIdentityProvider {
    documents: Arc<dyn DocumentStore>,
    device: Arc<dyn KeyValueStore>,
    resets: Mutex<Vec<String>>,
}

fn provider(err: RemoteError) -> AuthError {
    AuthError::Provider(err.to_string())
}

fn storage(err: StorageError) -> AuthError {
    AuthError::Storage(err.to_string())
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn to_fields<T: Serialize>(value: &T) -> Result<Fields, AuthError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(AuthError::Provider("record did not serialize".to_string())),
    }
}

impl HostedIdentityProvider {
    pub fn new(documents: Arc<dyn DocumentStore>, device: Arc<dyn KeyValueStore>) -> Self {
        Self {
            documents,
            device,
            resets: Mutex::new(Vec::new()),
        }
    }

    /// Addresses a reset mail was sent to, oldest first.
    pub fn sent_resets(&self) -> Vec<String> {
        self.resets.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn credential(&self, email: &str) -> Result<Option<Credential>, AuthError> {
        let Some(doc) = self
            .documents
            .get(CREDENTIALS_COLLECTION, &email_key(email))
            .await
            .map_err(provider)?
        else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(doc.fields))
            .map(Some)
            .map_err(|e| AuthError::Provider(format!("malformed credential: {e}")))
    }

    async fn store_credential(&self, email: &str, credential: &Credential) -> Result<(), AuthError> {
        self.documents
            .set(CREDENTIALS_COLLECTION, &email_key(email), to_fields(credential)?)
            .await
            .map_err(provider)
    }

    async fn load_profile(&self, id: &UserId) -> Result<UserSession, AuthError> {
        let doc = self
            .documents
            .get(PROFILES_COLLECTION, &id.to_string())
            .await
            .map_err(provider)?
            .ok_or_else(|| AuthError::Provider(format!("profile {id} missing")))?;
        let mut fields = doc.fields;
        fields.insert("id".to_string(), Value::String(doc.id));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| AuthError::Provider(format!("malformed profile {id}: {e}")))
    }

    async fn store_profile(&self, session: &UserSession) -> Result<(), AuthError> {
        let mut fields = to_fields(session)?;
        fields.remove("id");
        self.documents
            .set(PROFILES_COLLECTION, &session.id.to_string(), fields)
            .await
            .map_err(provider)
    }

    async fn current(&self) -> Result<Option<UserSession>, AuthError> {
        get_json(self.device.as_ref(), SESSION_KEY).await.map_err(storage)
    }

    async fn set_current(&self, session: &UserSession) -> Result<(), AuthError> {
        set_json(self.device.as_ref(), SESSION_KEY, session).await.map_err(storage)
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn restore(&self) -> Result<Option<UserSession>, AuthError> {
        match get_json(self.device.as_ref(), SESSION_KEY).await {
            Ok(session) => Ok(session),
            Err(StorageError::Malformed { .. }) => {
                tracing::warn!("Discarding unreadable stored session");
                self.device.remove(SESSION_KEY).await.map_err(storage)?;
                Ok(None)
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserSession, AuthError> {
        if self.credential(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        let credential = Credential {
            uid: UserId::new(),
            password: PasswordHash::new(password),
        };
        self.store_credential(email, &credential).await?;

        let session = UserSession::new(credential.uid, name, email);
        if let Err(e) = self.store_profile(&session).await {
            // Account creation and profile write are one step for the caller.
            if let Err(undo) = self
                .documents
                .delete(CREDENTIALS_COLLECTION, &email_key(email))
                .await
            {
                tracing::error!("Failed to roll back credential after {}: {}", e, undo);
            }
            return Err(e);
        }
        self.set_current(&session).await?;
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        let credential = self
            .credential(email)
            .await?
            .filter(|c| c.password.verify(password))
            .ok_or(AuthError::InvalidCredentials)?;
        let session = self.load_profile(&credential.uid).await?;
        self.set_current(&session).await?;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.device.remove(SESSION_KEY).await.map_err(storage)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if self.credential(email).await?.is_none() {
            return Err(AuthError::UnknownEmail);
        }
        tracing::info!("Password reset mail queued for {}", email_key(email));
        if let Ok(mut resets) = self.resets.lock() {
            resets.push(email_key(email));
        }
        Ok(())
    }

    async fn save_profile(&self, session: &UserSession) -> Result<UserSession, AuthError> {
        self.store_profile(session).await?;
        let stored = self.load_profile(&session.id).await?;
        if self.current().await?.is_some_and(|c| c.id == stored.id) {
            self.set_current(&stored).await?;
        }
        Ok(stored)
    }

    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), AuthError> {
        let mut credential = self.credential(email).await?.ok_or(AuthError::UnknownEmail)?;
        if !credential.password.verify(current) {
            return Err(AuthError::InvalidCredentials);
        }
        credential.password = PasswordHash::new(new);
        self.store_credential(email, &credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InMemoryDocumentStore;
    use crate::kv::InMemoryKeyValueStore;

    fn hosted(docs: Arc<InMemoryDocumentStore>, device: Arc<InMemoryKeyValueStore>) -> HostedIdentityProvider {
        HostedIdentityProvider::new(docs, device)
    }

    #[tokio::test]
    async fn profile_lives_in_the_document_store() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let hosted = hosted(docs.clone(), Arc::new(InMemoryKeyValueStore::new()));

        let mut ada = hosted.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();
        let doc = docs
            .get(PROFILES_COLLECTION, &ada.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields["name"], "Ada");

        ada.name = "Ada L.".to_string();
        hosted.save_profile(&ada).await.unwrap();
        hosted.sign_out().await.unwrap();
        assert_eq!(hosted.restore().await.unwrap(), None);

        let again = hosted.sign_in("ADA@example.com", "secret1").await.unwrap();
        assert_eq!(again.name, "Ada L.");
    }

    #[tokio::test]
    async fn accounts_and_session_outlive_the_provider() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let device = Arc::new(InMemoryKeyValueStore::new());
        let ada = hosted(docs.clone(), device.clone())
            .sign_up("Ada", "ada@example.com", "secret1")
            .await
            .unwrap();

        let next_run = hosted(docs.clone(), device);
        assert_eq!(next_run.restore().await.unwrap(), Some(ada.clone()));

        let other_device = hosted(docs, Arc::new(InMemoryKeyValueStore::new()));
        assert_eq!(other_device.restore().await.unwrap(), None);
        assert_eq!(other_device.sign_in("ada@example.com", "secret1").await.unwrap().id, ada.id);
        assert_eq!(
            other_device.sign_up("Ada", "ada@example.com", "secret1").await,
            Err(AuthError::EmailTaken)
        );
    }

    #[tokio::test]
    async fn failed_profile_write_rolls_back_the_account() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let hosted = hosted(docs.clone(), Arc::new(InMemoryKeyValueStore::new()));

        // The credential write succeeds, the profile write fails.
        docs.fail_write_after(1, RemoteError::Unavailable("offline".into()));
        assert!(matches!(
            hosted.sign_up("Ada", "ada@example.com", "secret1").await,
            Err(AuthError::Provider(_))
        ));
        assert_eq!(hosted.restore().await.unwrap(), None);
        assert!(hosted.sign_up("Ada", "ada@example.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn password_change_is_stored() {
        let hosted = hosted(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryKeyValueStore::new()),
        );
        hosted.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();

        assert_eq!(
            hosted.change_password("ada@example.com", "wrong1", "secret2").await,
            Err(AuthError::InvalidCredentials)
        );
        hosted.change_password("ada@example.com", "secret1", "secret2").await.unwrap();
        assert_eq!(
            hosted.sign_in("ada@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(hosted.sign_in("ada@example.com", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn reset_is_recorded_for_known_accounts() {
        let hosted = hosted(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryKeyValueStore::new()),
        );
        hosted.sign_up("Ada", "ada@example.com", "secret1").await.unwrap();

        hosted.send_password_reset("ada@example.com").await.unwrap();
        assert_eq!(
            hosted.send_password_reset("bob@example.com").await,
            Err(AuthError::UnknownEmail)
        );
        assert_eq!(hosted.sent_resets(), vec!["ada@example.com".to_string()]);
    }
}
