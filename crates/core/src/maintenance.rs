use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::UnknownVariant;

/// Severity of a maintenance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceLevel {
    /// Heavy features are paused; chat and admin traffic continue.
    Soft,
    /// Only admin routes and the health endpoint are served.
    Hard,
}

impl MaintenanceLevel {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for MaintenanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MaintenanceLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(UnknownVariant {
                kind: "maintenance level",
                value: other.to_owned(),
            }),
        }
    }
}

/// The maintenance state, serialized as JSON into the `maintenance_mode`
/// system flag and re-read on every gated request.
///
/// `is_active = false` is equivalent to "not in maintenance".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceState {
    pub level: MaintenanceLevel,
    /// Human-readable reason shown in rejections and notifications.
    pub reason: String,
    /// Feature whose pool exhaustion triggered auto-entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// Admin id for manual entry; `None` for automatic entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    pub triggered_at: DateTime<Utc>,
    pub is_active: bool,
}

impl MaintenanceState {
    /// A freshly-entered maintenance state.
    #[must_use]
    pub fn entered(
        level: MaintenanceLevel,
        reason: impl Into<String>,
        feature: Option<String>,
        triggered_by: Option<String>,
    ) -> Self {
        Self {
            level,
            reason: reason.into(),
            feature,
            triggered_by,
            triggered_at: Utc::now(),
            is_active: true,
        }
    }

    /// Serialize for storage in the system flag.
    #[must_use]
    pub fn to_flag_value(&self) -> String {
        // Serialization of this shape cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a flag value back into a state. Returns `None` for empty or
    /// malformed values, which callers treat as "not in maintenance".
    #[must_use]
    pub fn from_flag_value(value: &str) -> Option<Self> {
        if value.trim().is_empty() {
            return None;
        }
        serde_json::from_str(value).ok()
    }
}
