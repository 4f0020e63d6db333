use async_trait::async_trait;

use vaidya_core::credential::HealthCheckRecord;

use crate::error::StoreError;

/// Append-only storage for credential probe results.
#[async_trait]
pub trait HealthCheckStore: Send + Sync {
    /// Append one probe record.
    async fn append_health_check(&self, record: HealthCheckRecord) -> Result<(), StoreError>;

    /// Most recent records across all credentials, newest first, bounded by
    /// `limit`.
    async fn recent_health_checks(&self, limit: u32)
        -> Result<Vec<HealthCheckRecord>, StoreError>;

    /// Most recent records for one credential, newest first.
    async fn health_checks_for(
        &self,
        credential_id: &str,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, StoreError>;
}
