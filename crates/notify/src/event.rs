use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// An operator-facing event produced by the core.
///
/// Events fan out to every configured sink; delivery failures never block
/// the operation that fired the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A pooled credential failed and may need attention.
    ApiKeyFailure {
        key_id: String,
        provider: String,
        feature: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A request failed over from one credential to another.
    Fallback {
        from_key_id: String,
        to_key_id: String,
        provider: String,
        feature: String,
        timestamp: DateTime<Utc>,
    },
    /// The system entered maintenance mode automatically or manually.
    MaintenanceTriggered {
        level: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// An admin performed a critical override (e.g. exiting maintenance).
    AdminOverride {
        admin_id: String,
        action: String,
        details: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Short discriminator used in logs and webhook payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKeyFailure { .. } => "api_key_failure",
            Self::Fallback { .. } => "fallback",
            Self::MaintenanceTriggered { .. } => "maintenance_triggered",
            Self::AdminOverride { .. } => "admin_override",
        }
    }

    /// Email subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::ApiKeyFailure {
                provider, feature, ..
            } => format!("[Vaidya] API Key Failure: {provider}/{feature}"),
            Self::Fallback {
                provider, feature, ..
            } => format!("[Vaidya] Fallback Triggered: {provider}/{feature}"),
            Self::MaintenanceTriggered { level, .. } => format!(
                "[Vaidya] URGENT: {} Maintenance Mode Triggered",
                level.to_uppercase()
            ),
            Self::AdminOverride { action, .. } => format!("[Vaidya] Admin Override: {action}"),
        }
    }

    /// HTML email body.
    #[must_use]
    pub fn html_body(&self) -> String {
        match self {
            Self::ApiKeyFailure {
                key_id,
                provider,
                feature,
                error,
                timestamp,
            } => format!(
                "<html><body>\
                 <h2>API Key Failure Alert</h2>\
                 <p>An API key has failed and may need attention.</p>\
                 <ul>\
                 <li><strong>Key ID:</strong> {key_id}</li>\
                 <li><strong>Provider:</strong> {provider}</li>\
                 <li><strong>Feature:</strong> {feature}</li>\
                 <li><strong>Error:</strong> {error}</li>\
                 <li><strong>Time:</strong> {timestamp}</li>\
                 </ul>\
                 <p>Check the admin panel and consider adding backup keys.</p>\
                 </body></html>"
            ),
            Self::Fallback {
                from_key_id,
                to_key_id,
                provider,
                feature,
                timestamp,
            } => format!(
                "<html><body>\
                 <h2>API Key Fallback Alert</h2>\
                 <p>The system automatically failed over to a backup API key.</p>\
                 <ul>\
                 <li><strong>Failed Key:</strong> {from_key_id}</li>\
                 <li><strong>Fallback Key:</strong> {to_key_id}</li>\
                 <li><strong>Provider:</strong> {provider}</li>\
                 <li><strong>Feature:</strong> {feature}</li>\
                 <li><strong>Time:</strong> {timestamp}</li>\
                 </ul>\
                 <p>The primary key may need attention.</p>\
                 </body></html>"
            ),
            Self::MaintenanceTriggered {
                level,
                reason,
                feature,
                timestamp,
            } => {
                let feature_row = feature.as_ref().map_or(String::new(), |f| {
                    format!("<li><strong>Feature:</strong> {f}</li>")
                });
                let explanation = if level == "soft" {
                    "Heavy features are paused; chat and admin access remain available."
                } else {
                    "Only admin access is available. All user features are disabled."
                };
                format!(
                    "<html><body>\
                     <h2 style=\"color: red;\">Maintenance Mode Alert</h2>\
                     <p><strong>The system entered {level} maintenance mode.</strong></p>\
                     <ul>\
                     <li><strong>Level:</strong> {level}</li>\
                     <li><strong>Reason:</strong> {reason}</li>\
                     {feature_row}\
                     <li><strong>Time:</strong> {timestamp}</li>\
                     </ul>\
                     <p>{explanation}</p>\
                     <p><strong>Action required:</strong> resolve the underlying issue.</p>\
                     </body></html>"
                )
            }
            Self::AdminOverride {
                admin_id,
                action,
                details,
                timestamp,
            } => format!(
                "<html><body>\
                 <h2>Admin Override Notification</h2>\
                 <ul>\
                 <li><strong>Admin ID:</strong> {admin_id}</li>\
                 <li><strong>Action:</strong> {action}</li>\
                 <li><strong>Details:</strong> {details}</li>\
                 <li><strong>Time:</strong> {timestamp}</li>\
                 </ul>\
                 </body></html>"
            ),
        }
    }

    /// JSON payload for webhook delivery. The serde representation already
    /// carries the `event` discriminator.
    #[must_use]
    pub fn webhook_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "event": self.kind() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_discriminator() {
        let event = NotifyEvent::Fallback {
            from_key_id: "k1".into(),
            to_key_id: "k2".into(),
            provider: "openrouter".into(),
            feature: "chat".into(),
            timestamp: Utc::now(),
        };
        let payload = event.webhook_payload();
        assert_eq!(payload["event"], "fallback");
        assert_eq!(payload["from_key_id"], "k1");
        assert_eq!(payload["to_key_id"], "k2");
    }

    #[test]
    fn subjects_name_the_event() {
        let event = NotifyEvent::MaintenanceTriggered {
            level: "hard".into(),
            reason: "total key failure".into(),
            feature: Some("chat".into()),
            timestamp: Utc::now(),
        };
        assert!(event.subject().contains("HARD"));
        assert!(event.html_body().contains("total key failure"));
    }

    #[test]
    fn soft_and_hard_bodies_differ() {
        let soft = NotifyEvent::MaintenanceTriggered {
            level: "soft".into(),
            reason: "no keys configured".into(),
            feature: None,
            timestamp: Utc::now(),
        };
        let hard = NotifyEvent::MaintenanceTriggered {
            level: "hard".into(),
            reason: "total key failure".into(),
            feature: None,
            timestamp: Utc::now(),
        };
        assert!(soft.html_body().contains("Heavy features are paused"));
        assert!(hard.html_body().contains("Only admin access"));
    }

    #[test]
    fn serde_roundtrip() {
        let event = NotifyEvent::ApiKeyFailure {
            key_id: "k9".into(),
            provider: "anthropic".into(),
            feature: "mcq".into(),
            error: "401 unauthorized".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: NotifyEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
