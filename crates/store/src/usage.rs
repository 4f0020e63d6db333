use async_trait::async_trait;
use chrono::NaiveDate;

use vaidya_core::UsageCounter;

use crate::error::StoreError;

/// Storage for per-user daily usage counters, keyed by `(user_id, date)`.
///
/// Counters are best-effort: concurrent `apply_usage` calls may interleave
/// with reads, and small overcounts past a cap are acceptable.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Fetch the counter row for a user and date.
    async fn get_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<UsageCounter>, StoreError>;

    /// Upsert today's row, adding `tokens`, counting one request and bumping
    /// the feature counter mapped to `feature` (if any).
    async fn apply_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        tokens: u64,
        feature: &str,
    ) -> Result<(), StoreError>;

    /// Zero the counter row for a user and date (admin reset).
    async fn reset_usage(&self, user_id: &str, date: NaiveDate) -> Result<(), StoreError>;
}
