use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{Plan, Role};

/// A user account.
///
/// The password hash and personal key ciphertext never leave the process
/// through serialization; listings carry the remaining fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Unique login email.
    pub email: String,
    pub display_name: String,
    pub plan: Plan,
    /// Administrative role; `None` for regular users.
    pub role: Option<Role>,
    /// Disabled accounts are rejected by every operation except re-enabling.
    pub disabled: bool,
    /// Encrypted personal override credential, tried before the shared pool.
    #[serde(default, skip_serializing)]
    pub personal_api_key: Option<String>,
    /// Argon2 password hash.
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user's role bypasses quota checks.
    #[must_use]
    pub fn bypasses_quota(&self) -> bool {
        self.role.is_some_and(Role::bypasses_quota)
    }
}

/// An entry in the admin allowlist: email address mapped to the role it
/// grants. Admin authority requires both a matching entry here and a
/// non-null role on the user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub email: String,
    pub role: Role,
}
