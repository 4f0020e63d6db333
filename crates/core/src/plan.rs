use serde::{Deserialize, Serialize};

/// Subscription plan assigned to a user account.
///
/// The plan determines daily usage caps (see [`PlanLimits`]). It is
/// independent of [`Role`], which gates administrative operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Default plan for new registrations.
    Free,
    /// Paid student tier.
    Student,
    /// Paid professional tier.
    Pro,
    /// Internal plan with effectively unlimited caps.
    Admin,
}

impl Plan {
    /// All known plans, in ascending order of capability.
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Student, Plan::Pro, Plan::Admin];

    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Student => "student",
            Self::Pro => "pro",
            Self::Admin => "admin",
        }
    }

    /// The usage caps for this plan.
    #[must_use]
    pub fn limits(self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits {
                daily_tokens: 10_000,
                daily_requests: 20,
                pdf_uploads: 0,
                mcqs_per_day: 5,
                images_per_day: 0,
                flashcards_per_day: 10,
            },
            Self::Student => PlanLimits {
                daily_tokens: 50_000,
                daily_requests: 100,
                pdf_uploads: 5,
                mcqs_per_day: 50,
                images_per_day: 10,
                flashcards_per_day: 100,
            },
            Self::Pro => PlanLimits {
                daily_tokens: 200_000,
                daily_requests: 500,
                pdf_uploads: 50,
                mcqs_per_day: 200,
                images_per_day: 50,
                flashcards_per_day: 500,
            },
            Self::Admin => PlanLimits::UNLIMITED,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "student" => Ok(Self::Student),
            "pro" => Ok(Self::Pro),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant {
                kind: "plan",
                value: other.to_owned(),
            }),
        }
    }
}

/// Administrative role attached to a user, independent of plan.
///
/// Roles gate admin operations; `SuperAdmin`, `Admin` and `Ops` additionally
/// bypass all quota checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Ops,
    Support,
    Viewer,
}

impl Role {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Ops => "ops",
            Self::Support => "support",
            Self::Viewer => "viewer",
        }
    }

    /// Whether this role bypasses all quota checks regardless of plan.
    #[must_use]
    pub fn bypasses_quota(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin | Self::Ops)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "ops" => Ok(Self::Ops),
            "support" => Ok(Self::Support),
            "viewer" => Ok(Self::Viewer),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_owned(),
            }),
        }
    }
}

/// Daily usage caps for a plan.
///
/// `u64::MAX` in any field means "unlimited" for that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum tokens consumed per calendar day.
    pub daily_tokens: u64,
    /// Maximum routed requests per calendar day.
    pub daily_requests: u64,
    /// Maximum PDF uploads per calendar day.
    pub pdf_uploads: u64,
    /// Maximum MCQ generations per calendar day.
    pub mcqs_per_day: u64,
    /// Maximum image analyses per calendar day.
    pub images_per_day: u64,
    /// Maximum flashcard generations per calendar day.
    pub flashcards_per_day: u64,
}

impl PlanLimits {
    /// Caps that never reject.
    pub const UNLIMITED: PlanLimits = PlanLimits {
        daily_tokens: u64::MAX,
        daily_requests: u64::MAX,
        pdf_uploads: u64::MAX,
        mcqs_per_day: u64::MAX,
        images_per_day: u64::MAX,
        flashcards_per_day: u64::MAX,
    };
}

/// Error returned when parsing an unknown enum string at a boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// The enum kind being parsed (e.g. `"plan"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn plan_roundtrip() {
        for plan in Plan::ALL {
            assert_eq!(Plan::from_str(plan.as_str()).unwrap(), plan);
        }
    }

    #[test]
    fn unknown_plan_rejected() {
        let err = Plan::from_str("premium").unwrap_err();
        assert_eq!(err.to_string(), "unknown plan: premium");
    }

    #[test]
    fn plan_serde_snake_case() {
        let json = serde_json::to_string(&Plan::Free).unwrap();
        assert_eq!(json, "\"free\"");
        let back: Plan = serde_json::from_str("\"student\"").unwrap();
        assert_eq!(back, Plan::Student);
    }

    #[test]
    fn free_plan_limits() {
        let limits = Plan::Free.limits();
        assert_eq!(limits.daily_tokens, 10_000);
        assert_eq!(limits.daily_requests, 20);
        assert_eq!(limits.pdf_uploads, 0);
        assert_eq!(limits.images_per_day, 0);
    }

    #[test]
    fn admin_plan_is_unlimited() {
        assert_eq!(Plan::Admin.limits(), PlanLimits::UNLIMITED);
    }

    #[test]
    fn quota_bypass_roles() {
        assert!(Role::SuperAdmin.bypasses_quota());
        assert!(Role::Admin.bypasses_quota());
        assert!(Role::Ops.bypasses_quota());
        assert!(!Role::Support.bypasses_quota());
        assert!(!Role::Viewer.bypasses_quota());
    }

    #[test]
    fn role_roundtrip() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Ops,
            Role::Support,
            Role::Viewer,
        ] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        assert!(Role::from_str("moderator").is_err());
    }
}
