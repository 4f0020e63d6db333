use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vaidya_core::{Credential, CredentialStatus};

use crate::error::StoreError;

/// Storage for the shared provider credential pool.
///
/// Methods here are mechanical row operations; selection policy, failure
/// promotion and notification live in the gateway's credential service.
/// All ordered reads return `(priority DESC, created_at DESC)`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a credential row.
    async fn insert_credential(&self, credential: Credential) -> Result<(), StoreError>;

    /// Fetch a credential by id.
    async fn get_credential(&self, id: &str) -> Result<Option<Credential>, StoreError>;

    /// List every credential, ordered.
    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError>;

    /// Delete a credential. Returns `true` if the row existed.
    async fn delete_credential(&self, id: &str) -> Result<bool, StoreError>;

    /// Set status and optionally priority; bumps `updated_at`.
    async fn set_credential_status(
        &self,
        id: &str,
        status: CredentialStatus,
        priority: Option<i32>,
    ) -> Result<(), StoreError>;

    /// Credentials with `status = active` for a `(provider, feature)` pair,
    /// ordered.
    async fn active_credentials(
        &self,
        provider: &str,
        feature: &str,
    ) -> Result<Vec<Credential>, StoreError>;

    /// All credentials for a feature regardless of status, ordered. Used by
    /// maintenance evaluation.
    async fn credentials_for_feature(&self, feature: &str) -> Result<Vec<Credential>, StoreError>;

    /// Distinct providers that have at least one active credential for the
    /// feature, ordered by their best credential's priority descending.
    async fn providers_with_active(&self, feature: &str) -> Result<Vec<String>, StoreError>;

    /// Increment the failure count, returning the new value.
    async fn increment_failure(&self, id: &str) -> Result<u32, StoreError>;

    /// Reset the failure count to zero.
    async fn clear_failures(&self, id: &str) -> Result<(), StoreError>;

    /// Update the last-used timestamp.
    async fn touch_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}
