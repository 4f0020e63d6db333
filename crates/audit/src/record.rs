use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit record capturing one administrative mutation.
///
/// Records are append-only. Every admin mutation produces exactly one record
/// with the acting admin, the mutated target and a detail blob carrying
/// before/after values for the changed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier for this audit record (UUID v4).
    pub id: String,
    /// Identity of the admin who performed the mutation. Break-glass access
    /// through the emergency email appears here like any other admin.
    pub admin_id: String,
    /// Mutation discriminator (e.g. `add_api_key`, `toggle_feature`).
    pub action_type: String,
    /// Kind of entity mutated (e.g. `api_key`, `user`, `feature`, `flag`).
    pub target_type: String,
    /// Identifier of the mutated entity.
    pub target_id: String,
    /// Structured detail: before/after values and contextual fields.
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a new record with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        admin_id: impl Into<String>,
        action_type: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            admin_id: admin_id.into(),
            action_type: action_type.into(),
            target_type: target_type.into(),
            target_id: target_id.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Query parameters for searching audit records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Filter by acting admin.
    pub admin_id: Option<String>,
    /// Filter by mutation discriminator.
    pub action_type: Option<String>,
    /// Filter by target kind.
    pub target_type: Option<String>,
    /// Filter by target id.
    pub target_id: Option<String>,
    /// Only records created at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only records created at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Number of records to skip for pagination.
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// Return the effective limit, clamped to 1..=1000, defaulting to 50.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    /// Return the effective offset, defaulting to 0.
    #[must_use]
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// A paginated page of audit records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    /// The records matching the query, newest first.
    pub records: Vec<AuditRecord>,
    /// Total number of records matching the query (before pagination).
    pub total: u64,
    /// The limit used for this page.
    pub limit: u32,
    /// The offset used for this page.
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_clamps() {
        assert_eq!(AuditQuery::default().effective_limit(), 50);
        let q = AuditQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), 1);
        let q = AuditQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), 1000);
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = AuditRecord::new(
            "admin-1",
            "update_key_status",
            "api_key",
            "k-42",
            serde_json::json!({"old_status": "active", "new_status": "disabled"}),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action_type, "update_key_status");
        assert_eq!(back.details["old_status"], "active");
    }
}
