use async_trait::async_trait;

use vaidya_core::{AllowlistEntry, Plan, Role, User};

use crate::error::StoreError;

/// Storage for user accounts and the admin allowlist.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::Conflict`] on a duplicate
    /// email.
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    /// Fetch a user by id.
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Fetch a user by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// List users, most recently created first, bounded by `limit`.
    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StoreError>;

    /// Change a user's plan.
    async fn set_plan(&self, id: &str, plan: Plan) -> Result<(), StoreError>;

    /// Set or clear the disabled flag.
    async fn set_disabled(&self, id: &str, disabled: bool) -> Result<(), StoreError>;

    /// Set or clear the encrypted personal override credential.
    async fn set_personal_key(&self, id: &str, ciphertext: Option<String>)
        -> Result<(), StoreError>;

    /// Role granted to an email by the admin allowlist, if any.
    async fn allowlist_role(&self, email: &str) -> Result<Option<Role>, StoreError>;

    /// Add or replace an allowlist entry.
    async fn upsert_allowlist(&self, entry: AllowlistEntry) -> Result<(), StoreError>;
}
