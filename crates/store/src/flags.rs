use async_trait::async_trait;

use vaidya_core::SystemFlag;

use crate::error::StoreError;

/// Storage for named system flags (feature toggles, maintenance state,
/// tunable limits).
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Fetch a flag by name.
    async fn get_flag(&self, name: &str) -> Result<Option<SystemFlag>, StoreError>;

    /// Insert or replace a flag.
    async fn set_flag(
        &self,
        name: &str,
        value: &str,
        updated_by: Option<&str>,
    ) -> Result<(), StoreError>;

    /// All flags whose name starts with `prefix`.
    async fn flags_with_prefix(&self, prefix: &str) -> Result<Vec<SystemFlag>, StoreError>;
}
