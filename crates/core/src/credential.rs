use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::UnknownVariant;

/// Consecutive failures after which an active credential is automatically
/// promoted to [`CredentialStatus::Degraded`].
pub const FAILURE_THRESHOLD: u32 = 3;

/// Health status of a pooled provider credential.
///
/// The `active -> degraded` transition is automatic (failure threshold);
/// every other transition is operator-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// Eligible for selection.
    Active,
    /// Skipped by selection after repeated failures; still counted when
    /// evaluating maintenance triggers.
    Degraded,
    /// Removed from service by an operator.
    Disabled,
}

impl CredentialStatus {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CredentialStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "degraded" => Ok(Self::Degraded),
            "disabled" => Ok(Self::Disabled),
            other => Err(UnknownVariant {
                kind: "credential status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A pooled API credential for an external LLM provider.
///
/// The secret is stored as an `ENC[AES256-GCM,...]` envelope and is never
/// serialized out of the admin surface; listings leave it opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Provider tag. An operator label; adapter dispatch is by feature.
    pub provider: String,
    /// Feature tag this credential serves.
    pub feature: String,
    /// Encrypted secret envelope. Never exposed through the API.
    #[serde(default, skip_serializing)]
    pub ciphertext: String,
    /// Selection priority; higher is preferred.
    pub priority: i32,
    /// Current health status.
    pub status: CredentialStatus,
    /// Consecutive failure count; reset on success and on operator
    /// restoration to active.
    pub failure_count: u32,
    /// When this credential last served a successful request.
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single probe result for a credential, appended by the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// The probed credential.
    pub credential_id: String,
    pub checked_at: DateTime<Utc>,
    /// `"healthy"` or `"failed"`.
    pub status: String,
    /// Probe round-trip latency, when the probe completed.
    pub latency_ms: Option<u64>,
    /// Error text for failed probes.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            CredentialStatus::Active,
            CredentialStatus::Degraded,
            CredentialStatus::Disabled,
        ] {
            assert_eq!(CredentialStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        let err = CredentialStatus::from_str("retired").unwrap_err();
        assert!(err.to_string().contains("retired"));
    }

    #[test]
    fn ciphertext_not_serialized() {
        let cred = Credential {
            id: "k1".into(),
            provider: "openrouter".into(),
            feature: "chat".into(),
            ciphertext: "ENC[AES256-GCM,data:abc,iv:def,tag:ghi]".into(),
            priority: 10,
            status: CredentialStatus::Active,
            failure_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&cred).unwrap();
        assert!(!json.contains("ENC["));
        assert!(json.contains("\"openrouter\""));
    }
}
