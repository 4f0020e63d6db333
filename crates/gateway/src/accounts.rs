use std::sync::Arc;

use tracing::{info, instrument};

use vaidya_store::UserStore;

use crate::credentials::CredentialService;
use crate::error::GatewayError;

/// User-facing account operations: personal override key management.
///
/// A personal key is tried by the router before the shared pool. Failures
/// never clear it automatically; removal is the explicit action here.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    credentials: CredentialService,
}

impl AccountService {
    /// Build the service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, credentials: CredentialService) -> Self {
        Self { users, credentials }
    }

    /// Encrypt and store the user's personal override key.
    #[instrument(skip(self, plaintext))]
    pub async fn set_personal_key(
        &self,
        user_id: &str,
        plaintext: &str,
    ) -> Result<(), GatewayError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))?;
        if user.disabled {
            return Err(GatewayError::AccountDisabled);
        }

        let ciphertext = self.credentials.encrypt_personal_key(plaintext)?;
        self.users
            .set_personal_key(user_id, Some(ciphertext))
            .await?;
        info!(user_id, "personal API key set");
        Ok(())
    }

    /// Remove the user's personal override key.
    #[instrument(skip(self))]
    pub async fn clear_personal_key(&self, user_id: &str) -> Result<(), GatewayError> {
        self.users.set_personal_key(user_id, None).await?;
        info!(user_id, "personal API key cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use vaidya_core::{Plan, User};
    use vaidya_crypto::{parse_master_key, CredentialCipher, ExposeSecret};
    use vaidya_notify::Notifier;
    use vaidya_store::MemoryStore;

    use super::*;

    async fn fixture() -> (AccountService, CredentialService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cipher = Arc::new(CredentialCipher::new(
            parse_master_key(&"42".repeat(32)).unwrap(),
        ));
        let credentials =
            CredentialService::new(store.clone(), cipher, Notifier::disabled());
        let service = AccountService::new(store.clone(), credentials.clone());

        store
            .insert_user(User {
                id: "u1".into(),
                email: "u1@example.com".into(),
                display_name: "U1".into(),
                plan: Plan::Pro,
                role: None,
                disabled: false,
                personal_api_key: None,
                password_hash: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        (service, credentials, store)
    }

    #[tokio::test]
    async fn set_and_clear_personal_key() {
        let (service, credentials, store) = fixture().await;
        service.set_personal_key("u1", "sk-or-v1-personal").await.unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        let ciphertext = user.personal_api_key.unwrap();
        assert!(ciphertext.starts_with("ENC[AES256-GCM,"));
        let secret = credentials.decrypt_secret(&ciphertext).unwrap();
        assert_eq!(secret.expose_secret(), "sk-or-v1-personal");

        service.clear_personal_key("u1").await.unwrap();
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert!(user.personal_api_key.is_none());
    }

    #[tokio::test]
    async fn short_key_rejected() {
        let (service, _, _) = fixture().await;
        let err = service.set_personal_key("u1", "short").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }
}
