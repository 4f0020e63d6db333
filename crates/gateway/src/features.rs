use std::sync::Arc;

use tracing::warn;

use vaidya_core::{feature_flag_name, features, parse_feature_enabled};
use vaidya_store::FlagStore;

use crate::error::GatewayError;

/// Route prefixes that bypass the feature gate entirely.
const EXEMPT_PREFIXES: [&str; 3] = ["/api/health", "/api/auth", "/api/admin"];

/// Per-feature kill switch, evaluated in front of routing.
///
/// Flags are read on every request; a missing or unparsable flag means
/// enabled, so a misconfiguration never blocks legitimate traffic.
#[derive(Clone)]
pub struct FeatureGate {
    flags: Arc<dyn FlagStore>,
}

impl FeatureGate {
    /// Build the gate.
    #[must_use]
    pub fn new(flags: Arc<dyn FlagStore>) -> Self {
        Self { flags }
    }

    /// Map a request path to the feature tag it exercises.
    ///
    /// Unmapped paths return `None` and always pass.
    #[must_use]
    pub fn feature_for_path(path: &str) -> Option<&'static str> {
        if path.starts_with("/api/chat") {
            Some(features::CHAT)
        } else if path.starts_with("/api/commands/flashcard") {
            Some(features::FLASHCARD)
        } else if path.starts_with("/api/commands/mcq") {
            Some(features::MCQ)
        } else if path.starts_with("/api/commands/highyield") {
            Some(features::HIGHYIELD)
        } else if path.starts_with("/api/commands/explain") {
            Some(features::EXPLAIN)
        } else if path.starts_with("/api/commands/map") {
            Some(features::MAP)
        } else if path.starts_with("/api/images") {
            Some(features::IMAGE)
        } else if path.starts_with("/api/documents") {
            Some(features::DOCUMENT_UPLOAD)
        } else {
            None
        }
    }

    /// Whether the path bypasses the gate (health, auth, admin).
    #[must_use]
    pub fn is_exempt(path: &str) -> bool {
        EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
    }

    /// Whether a feature is currently enabled.
    ///
    /// A flag-store read failure counts as enabled (logged): the kill switch
    /// exists to stop features deliberately, not accidentally.
    pub async fn is_enabled(&self, feature: &str) -> bool {
        match self.flags.get_flag(&feature_flag_name(feature)).await {
            Ok(flag) => parse_feature_enabled(flag.as_ref().map(|f| f.value.as_str())),
            Err(e) => {
                warn!(feature, error = %e, "feature flag read failed; treating as enabled");
                true
            }
        }
    }

    /// Gate one request path. Exempt and unmapped paths always pass.
    pub async fn check_path(&self, path: &str) -> Result<(), GatewayError> {
        if Self::is_exempt(path) {
            return Ok(());
        }
        let Some(feature) = Self::feature_for_path(path) else {
            return Ok(());
        };
        if self.is_enabled(feature).await {
            Ok(())
        } else {
            Err(GatewayError::FeatureDisabled {
                feature: feature.to_owned(),
            })
        }
    }

    /// Enabled/disabled state of every known feature, defaults included.
    pub async fn all_states(&self) -> Result<Vec<(String, bool)>, GatewayError> {
        let mut states: Vec<(String, bool)> = Vec::new();
        for flag in self.flags.flags_with_prefix("feature_").await? {
            let Some(feature) = flag
                .name
                .strip_prefix("feature_")
                .and_then(|rest| rest.strip_suffix("_enabled"))
            else {
                continue;
            };
            states.push((
                feature.to_owned(),
                parse_feature_enabled(Some(flag.value.as_str())),
            ));
        }
        for feature in [
            features::CHAT,
            features::FLASHCARD,
            features::MCQ,
            features::HIGHYIELD,
            features::EXPLAIN,
            features::MAP,
            features::IMAGE,
            features::DOCUMENT_UPLOAD,
        ] {
            if !states.iter().any(|(name, _)| name == feature) {
                states.push((feature.to_owned(), true));
            }
        }
        states.sort();
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use vaidya_store::MemoryStore;

    use super::*;

    fn gate() -> (FeatureGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (FeatureGate::new(store.clone()), store)
    }

    #[test]
    fn path_feature_map() {
        assert_eq!(
            FeatureGate::feature_for_path("/api/chat/sessions"),
            Some("chat")
        );
        assert_eq!(
            FeatureGate::feature_for_path("/api/commands/mcq"),
            Some("mcq")
        );
        assert_eq!(
            FeatureGate::feature_for_path("/api/documents"),
            Some("document_upload")
        );
        assert_eq!(FeatureGate::feature_for_path("/api/images/upload"), Some("image"));
        assert_eq!(FeatureGate::feature_for_path("/api/unknown"), None);
    }

    #[test]
    fn exempt_prefixes() {
        assert!(FeatureGate::is_exempt("/api/health"));
        assert!(FeatureGate::is_exempt("/api/auth/login"));
        assert!(FeatureGate::is_exempt("/api/admin/api-keys"));
        assert!(!FeatureGate::is_exempt("/api/chat/sessions"));
    }

    #[tokio::test]
    async fn missing_flag_is_enabled() {
        let (gate, _) = gate();
        assert!(gate.is_enabled("mcq").await);
        gate.check_path("/api/commands/mcq").await.unwrap();
    }

    #[tokio::test]
    async fn disabled_flag_rejects_with_feature_name() {
        let (gate, store) = gate();
        store
            .set_flag("feature_mcq_enabled", "False", Some("admin-1"))
            .await
            .unwrap();

        let err = gate.check_path("/api/commands/mcq").await.unwrap_err();
        match err {
            GatewayError::FeatureDisabled { feature } => assert_eq!(feature, "mcq"),
            other => panic!("unexpected error: {other:?}"),
        }

        // Re-enabling lets the same path through.
        store
            .set_flag("feature_mcq_enabled", "True", Some("admin-1"))
            .await
            .unwrap();
        gate.check_path("/api/commands/mcq").await.unwrap();
    }

    #[tokio::test]
    async fn garbage_flag_is_enabled() {
        let (gate, store) = gate();
        store
            .set_flag("feature_chat_enabled", "definitely", None)
            .await
            .unwrap();
        assert!(gate.is_enabled("chat").await);
    }

    #[tokio::test]
    async fn exempt_path_passes_even_when_disabled() {
        let (gate, store) = gate();
        store
            .set_flag("feature_chat_enabled", "false", None)
            .await
            .unwrap();
        gate.check_path("/api/admin/users").await.unwrap();
        gate.check_path("/api/health").await.unwrap();
    }

    #[tokio::test]
    async fn all_states_includes_defaults() {
        let (gate, store) = gate();
        store
            .set_flag("feature_mcq_enabled", "false", None)
            .await
            .unwrap();

        let states = gate.all_states().await.unwrap();
        let mcq = states.iter().find(|(name, _)| name == "mcq").unwrap();
        assert!(!mcq.1);
        let chat = states.iter().find(|(name, _)| name == "chat").unwrap();
        assert!(chat.1);
    }
}
