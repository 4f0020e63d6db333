use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the system flag carrying the serialized maintenance state.
pub const MAINTENANCE_FLAG: &str = "maintenance_mode";

/// Flag name for a feature kill switch, e.g. `feature_mcq_enabled`.
#[must_use]
pub fn feature_flag_name(feature: &str) -> String {
    format!("feature_{feature}_enabled")
}

/// A named runtime flag: feature toggles, maintenance state and tunable
/// limits all live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemFlag {
    pub name: String,
    pub value: String,
    /// Admin who last wrote the flag, when written through the admin surface.
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a feature-toggle flag value.
///
/// Interpreted case-insensitively as true/false. Missing (`None`) and
/// unparsable values default to enabled so a misconfigured flag never blocks
/// legitimate traffic.
#[must_use]
pub fn parse_feature_enabled(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "false" => false,
            "true" => true,
            _ => true,
        },
    }
}
