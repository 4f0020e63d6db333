use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use vaidya_core::{Credential, CredentialStatus, FAILURE_THRESHOLD};
use vaidya_crypto::{CredentialCipher, SecretString};
use vaidya_notify::{Notifier, NotifyEvent};
use vaidya_store::CredentialStore;

use crate::error::GatewayError;

/// Minimum plaintext length accepted for a credential secret.
pub const MIN_SECRET_LEN: usize = 10;

/// A credential selected for use: the row plus its decrypted secret.
pub struct ActiveKey {
    pub credential: Credential,
    pub secret: SecretString,
}

/// Service over the credential pool: encrypted persistence, priority
/// selection, failure bookkeeping and automatic promotion.
///
/// Selection re-reads the store on every call; no decrypted secret is cached
/// between requests.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<CredentialCipher>,
    notifier: Notifier,
}

impl CredentialService {
    /// Build the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: Arc<CredentialCipher>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            cipher,
            notifier,
        }
    }

    /// Encrypt the cleartext of a personal override key.
    ///
    /// Shares the credential length rule and cipher with pooled keys.
    pub fn encrypt_personal_key(&self, plaintext: &str) -> Result<String, GatewayError> {
        if plaintext.len() < MIN_SECRET_LEN {
            return Err(GatewayError::InvalidInput(format!(
                "API key must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        Ok(self.cipher.encrypt(plaintext)?)
    }

    /// Decrypt a stored secret envelope (pooled or personal).
    pub fn decrypt_secret(&self, ciphertext: &str) -> Result<SecretString, GatewayError> {
        Ok(self.cipher.decrypt(ciphertext)?)
    }

    /// Add a credential: validate, encrypt, insert.
    #[instrument(skip(self, plaintext_secret))]
    pub async fn add(
        &self,
        provider: &str,
        feature: &str,
        plaintext_secret: &str,
        priority: i32,
        initial_status: &str,
    ) -> Result<Credential, GatewayError> {
        let status = CredentialStatus::from_str(initial_status)
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        if plaintext_secret.len() < MIN_SECRET_LEN {
            return Err(GatewayError::InvalidInput(format!(
                "API key must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if provider.trim().is_empty() || feature.trim().is_empty() {
            return Err(GatewayError::InvalidInput(
                "provider and feature are required".to_owned(),
            ));
        }

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4().to_string(),
            provider: provider.to_owned(),
            feature: feature.to_owned(),
            ciphertext: self.cipher.encrypt(plaintext_secret)?,
            priority,
            status,
            failure_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_credential(credential.clone()).await?;
        info!(id = %credential.id, provider, feature, priority, "credential added");
        Ok(credential)
    }

    /// Every credential, ordered `(priority DESC, created_at DESC)`,
    /// ciphertext left opaque by the serializer.
    pub async fn list(&self) -> Result<Vec<Credential>, GatewayError> {
        Ok(self.store.list_credentials().await?)
    }

    /// Fetch one credential row.
    pub async fn get(&self, id: &str) -> Result<Credential, GatewayError> {
        self.store
            .get_credential(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("credential {id}")))
    }

    /// Update status (validated) and optionally priority. Moving a
    /// credential to active clears its failure count.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: &str,
        status: &str,
        priority: Option<i32>,
    ) -> Result<Credential, GatewayError> {
        let status = CredentialStatus::from_str(status)
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;

        // Existence check so a bad id is a 404, not a silent no-op.
        self.get(id).await?;

        self.store.set_credential_status(id, status, priority).await?;
        if status == CredentialStatus::Active {
            self.store.clear_failures(id).await?;
        }
        self.get(id).await
    }

    /// Delete a credential.
    pub async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        if !self.store.delete_credential(id).await? {
            return Err(GatewayError::NotFound(format!("credential {id}")));
        }
        Ok(())
    }

    /// The single best active credential for `(provider, feature)`,
    /// decrypted. Undecryptable rows are skipped and logged; they require
    /// operator attention and are never auto-disabled.
    pub async fn best_active(
        &self,
        provider: &str,
        feature: &str,
    ) -> Result<Option<ActiveKey>, GatewayError> {
        Ok(self.all_active(provider, feature).await?.into_iter().next())
    }

    /// All active credentials for `(provider, feature)` in fallback order,
    /// decrypted. Undecryptable rows are skipped and logged.
    pub async fn all_active(
        &self,
        provider: &str,
        feature: &str,
    ) -> Result<Vec<ActiveKey>, GatewayError> {
        let rows = self.store.active_credentials(provider, feature).await?;
        let mut keys = Vec::with_capacity(rows.len());
        for credential in rows {
            match self.cipher.decrypt(&credential.ciphertext) {
                Ok(secret) => keys.push(ActiveKey { credential, secret }),
                Err(e) => {
                    error!(
                        id = %credential.id,
                        error = %e,
                        "credential ciphertext is unusable; skipping"
                    );
                }
            }
        }
        Ok(keys)
    }

    /// Providers holding at least one active credential for the feature,
    /// best first.
    pub async fn providers_with_active(&self, feature: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self.store.providers_with_active(feature).await?)
    }

    /// Record a failed use. At [`FAILURE_THRESHOLD`] consecutive failures an
    /// active credential is promoted to degraded and an `api_key_failure`
    /// notification is emitted.
    #[instrument(skip(self, error_text))]
    pub async fn record_failure(&self, id: &str, error_text: &str) -> Result<u32, GatewayError> {
        let new_count = self.store.increment_failure(id).await?;
        warn!(id, failure_count = new_count, error = error_text, "credential failure recorded");

        if new_count >= FAILURE_THRESHOLD {
            let credential = self.get(id).await?;
            if credential.status == CredentialStatus::Active {
                self.store
                    .set_credential_status(id, CredentialStatus::Degraded, None)
                    .await?;
                warn!(id, "credential promoted to degraded");
                self.notifier
                    .publish(&NotifyEvent::ApiKeyFailure {
                        key_id: id.to_owned(),
                        provider: credential.provider.clone(),
                        feature: credential.feature.clone(),
                        error: error_text.to_owned(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }
        Ok(new_count)
    }

    /// Clear the failure count after a successful use.
    pub async fn record_success(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.store.clear_failures(id).await?)
    }

    /// Update the last-used timestamp. Never fails the calling request: the
    /// write runs on its own task (immune to request cancellation) and a
    /// storage error is logged and dropped.
    pub async fn touch_last_used(&self, id: &str) {
        let store = self.store.clone();
        let id = id.to_owned();
        let write = tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(&id, Utc::now()).await {
                warn!(id, error = %e, "failed to update last_used timestamp");
            }
        });
        let _ = write.await;
    }
}
