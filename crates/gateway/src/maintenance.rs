use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use vaidya_core::{
    is_heavy_feature, CredentialStatus, MaintenanceLevel, MaintenanceState, MAINTENANCE_FLAG,
};
use vaidya_notify::{Notifier, NotifyEvent};
use vaidya_store::{CredentialStore, FlagStore};

use crate::error::GatewayError;

/// Coarse classification of a request for maintenance gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Liveness probes; always served.
    Health,
    /// Admin surface; always served.
    Admin,
    /// Heavy features (document upload, image analysis, operator-marked).
    Heavy,
    /// Everything else (chat, commands).
    Standard,
}

/// Puts a feature (or the whole system) into a degraded mode when the
/// credential pool cannot serve it, and gates requests while the mode is
/// active.
///
/// State lives in the single `maintenance_mode` system flag and is re-read
/// on every gated request; there is no in-process cache.
#[derive(Clone)]
pub struct MaintenanceController {
    flags: Arc<dyn FlagStore>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Notifier,
    /// Features an operator marked heavy beyond the built-in set.
    extra_heavy: Arc<Vec<String>>,
}

impl MaintenanceController {
    /// Build the controller.
    #[must_use]
    pub fn new(
        flags: Arc<dyn FlagStore>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Notifier,
        extra_heavy: Vec<String>,
    ) -> Self {
        Self {
            flags,
            credentials,
            notifier,
            extra_heavy: Arc::new(extra_heavy),
        }
    }

    /// The active maintenance state, if any.
    ///
    /// Missing, malformed and `is_active = false` flag values all read as
    /// "not in maintenance".
    pub async fn current(&self) -> Result<Option<MaintenanceState>, GatewayError> {
        let Some(flag) = self.flags.get_flag(MAINTENANCE_FLAG).await? else {
            return Ok(None);
        };
        Ok(MaintenanceState::from_flag_value(&flag.value).filter(|state| state.is_active))
    }

    /// Enter maintenance. Validates the level string and emits one
    /// `maintenance_triggered` notification.
    #[instrument(skip(self, reason))]
    pub async fn enter(
        &self,
        level: &str,
        reason: &str,
        feature: Option<String>,
        triggered_by: Option<String>,
    ) -> Result<MaintenanceState, GatewayError> {
        let level = MaintenanceLevel::from_str(level)
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        let state = MaintenanceState::entered(level, reason, feature.clone(), triggered_by);

        self.flags
            .set_flag(
                MAINTENANCE_FLAG,
                &state.to_flag_value(),
                state.triggered_by.as_deref(),
            )
            .await?;
        warn!(level = %level, reason, "entered maintenance mode");

        self.notifier
            .publish(&NotifyEvent::MaintenanceTriggered {
                level: level.as_str().to_owned(),
                reason: reason.to_owned(),
                feature,
                timestamp: Utc::now(),
            })
            .await;

        Ok(state)
    }

    /// Exit maintenance. Emits exactly one `admin_override` notification
    /// when a mode was active; exiting while not in maintenance is a no-op.
    #[instrument(skip(self))]
    pub async fn exit(&self, admin_id: &str) -> Result<Option<MaintenanceState>, GatewayError> {
        let Some(previous) = self.current().await? else {
            return Ok(None);
        };

        let mut cleared = previous.clone();
        cleared.is_active = false;
        self.flags
            .set_flag(MAINTENANCE_FLAG, &cleared.to_flag_value(), Some(admin_id))
            .await?;
        info!(admin_id, previous_level = %previous.level, "exited maintenance mode");

        self.notifier
            .publish(&NotifyEvent::AdminOverride {
                admin_id: admin_id.to_owned(),
                action: "exit_maintenance".to_owned(),
                details: json!({
                    "previous_level": previous.level.as_str(),
                    "previous_reason": previous.reason,
                }),
                timestamp: Utc::now(),
            })
            .await;

        Ok(Some(previous))
    }

    /// Decide whether pool exhaustion for a feature warrants maintenance.
    ///
    /// No credentials at all: soft. Every credential disabled: hard. Only
    /// degraded credentials left (none active): soft. Any active credential
    /// remaining: none; the pool can still serve once transient errors
    /// clear.
    pub async fn evaluate_trigger(
        &self,
        feature: &str,
        failures: u32,
    ) -> Result<Option<(MaintenanceLevel, String)>, GatewayError> {
        let rows = self.credentials.credentials_for_feature(feature).await?;
        info!(feature, failures, pool_size = rows.len(), "evaluating maintenance trigger");

        if rows.is_empty() {
            return Ok(Some((
                MaintenanceLevel::Soft,
                "no keys configured".to_owned(),
            )));
        }
        if rows.iter().all(|c| c.status == CredentialStatus::Disabled) {
            return Ok(Some((
                MaintenanceLevel::Hard,
                "total key failure".to_owned(),
            )));
        }
        let any_active = rows.iter().any(|c| c.status == CredentialStatus::Active);
        let any_degraded = rows.iter().any(|c| c.status == CredentialStatus::Degraded);
        if !any_active && any_degraded {
            return Ok(Some((
                MaintenanceLevel::Soft,
                "only degraded keys remain".to_owned(),
            )));
        }
        Ok(None)
    }

    /// Evaluate pool exhaustion and enter maintenance when warranted.
    /// Failures here are logged, never propagated to the routing caller.
    pub async fn trigger_if_needed(&self, feature: &str, failures: u32) {
        match self.evaluate_trigger(feature, failures).await {
            Ok(Some((level, reason))) => {
                if let Err(e) = self
                    .enter(level.as_str(), &reason, Some(feature.to_owned()), None)
                    .await
                {
                    error!(feature, error = %e, "failed to enter maintenance mode");
                }
            }
            Ok(None) => {}
            Err(e) => error!(feature, error = %e, "maintenance evaluation failed"),
        }
    }

    /// Whether a feature counts as heavy for soft-maintenance gating.
    #[must_use]
    pub fn is_heavy(&self, feature: &str) -> bool {
        is_heavy_feature(feature) || self.extra_heavy.iter().any(|f| f == feature)
    }

    /// Gate one request.
    ///
    /// Health and admin routes always pass; authenticated admins pass
    /// everything. Soft maintenance rejects heavy routes; hard maintenance
    /// rejects every remaining route.
    pub async fn check_request(
        &self,
        class: RouteClass,
        caller_is_admin: bool,
    ) -> Result<(), GatewayError> {
        if matches!(class, RouteClass::Health | RouteClass::Admin) {
            return Ok(());
        }

        let Some(state) = self.current().await? else {
            return Ok(());
        };

        if caller_is_admin {
            return Ok(());
        }

        let rejected = match state.level {
            MaintenanceLevel::Soft => class == RouteClass::Heavy,
            MaintenanceLevel::Hard => true,
        };
        if rejected {
            return Err(GatewayError::Maintenance {
                level: state.level,
                reason: state.reason,
            });
        }
        Ok(())
    }

    /// Classify a feature tag for gating.
    #[must_use]
    pub fn classify_feature(&self, feature: &str) -> RouteClass {
        if self.is_heavy(feature) {
            RouteClass::Heavy
        } else {
            RouteClass::Standard
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use vaidya_core::Credential;
    use vaidya_notify::CapturingSink;
    use vaidya_store::MemoryStore;

    use super::*;

    fn controller() -> (MaintenanceController, Arc<MemoryStore>, Arc<CapturingSink>) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CapturingSink::new());
        let notifier = Notifier::new(vec![sink.clone()]);
        (
            MaintenanceController::new(store.clone(), store.clone(), notifier, vec![]),
            store,
            sink,
        )
    }

    async fn seed_credential(store: &MemoryStore, id: &str, status: CredentialStatus) {
        store
            .insert_credential(Credential {
                id: id.into(),
                provider: "openrouter".into(),
                feature: "chat".into(),
                ciphertext: "ENC[AES256-GCM,data:a,iv:b,tag:c]".into(),
                priority: 0,
                status,
                failure_count: 0,
                last_used_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_keys_evaluates_soft() {
        let (controller, _, _) = controller();
        let (level, reason) = controller
            .evaluate_trigger("chat", 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(level, MaintenanceLevel::Soft);
        assert_eq!(reason, "no keys configured");
    }

    #[tokio::test]
    async fn all_disabled_evaluates_hard() {
        let (controller, store, _) = controller();
        seed_credential(&store, "k1", CredentialStatus::Disabled).await;
        seed_credential(&store, "k2", CredentialStatus::Disabled).await;

        let (level, reason) = controller
            .evaluate_trigger("chat", 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(level, MaintenanceLevel::Hard);
        assert_eq!(reason, "total key failure");
    }

    #[tokio::test]
    async fn only_degraded_evaluates_soft() {
        let (controller, store, _) = controller();
        seed_credential(&store, "k1", CredentialStatus::Degraded).await;
        seed_credential(&store, "k2", CredentialStatus::Disabled).await;

        let (level, _) = controller
            .evaluate_trigger("chat", 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(level, MaintenanceLevel::Soft);
    }

    #[tokio::test]
    async fn active_key_means_no_maintenance() {
        let (controller, store, _) = controller();
        seed_credential(&store, "k1", CredentialStatus::Active).await;
        seed_credential(&store, "k2", CredentialStatus::Degraded).await;

        assert!(controller.evaluate_trigger("chat", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enter_validates_level() {
        let (controller, _, _) = controller();
        let err = controller
            .enter("medium", "because", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn enter_exit_roundtrip_notifies_once() {
        let (controller, _, sink) = controller();
        controller
            .enter("soft", "planned window", None, Some("admin-1".into()))
            .await
            .unwrap();
        assert!(controller.current().await.unwrap().is_some());
        assert_eq!(sink.events_of_kind("maintenance_triggered").len(), 1);

        let previous = controller.exit("admin-1").await.unwrap().unwrap();
        assert_eq!(previous.level, MaintenanceLevel::Soft);
        assert!(controller.current().await.unwrap().is_none());
        assert_eq!(sink.events_of_kind("admin_override").len(), 1);

        // Exiting again is a no-op with no further notification.
        assert!(controller.exit("admin-1").await.unwrap().is_none());
        assert_eq!(sink.events_of_kind("admin_override").len(), 1);
    }

    #[tokio::test]
    async fn soft_gates_heavy_only() {
        let (controller, _, _) = controller();
        controller
            .enter("soft", "no keys configured", Some("image".into()), None)
            .await
            .unwrap();

        controller
            .check_request(RouteClass::Standard, false)
            .await
            .unwrap();
        controller.check_request(RouteClass::Admin, false).await.unwrap();
        controller.check_request(RouteClass::Health, false).await.unwrap();

        let err = controller
            .check_request(RouteClass::Heavy, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Maintenance {
                level: MaintenanceLevel::Soft,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn hard_gates_everything_but_admin_and_health() {
        let (controller, _, _) = controller();
        controller
            .enter("hard", "total key failure", None, None)
            .await
            .unwrap();

        controller.check_request(RouteClass::Admin, false).await.unwrap();
        controller.check_request(RouteClass::Health, false).await.unwrap();

        assert!(controller
            .check_request(RouteClass::Standard, false)
            .await
            .is_err());
        assert!(controller
            .check_request(RouteClass::Heavy, false)
            .await
            .is_err());

        // Authenticated admins pass everywhere.
        controller
            .check_request(RouteClass::Standard, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn operator_marked_features_are_heavy() {
        let store = Arc::new(MemoryStore::new());
        let controller = MaintenanceController::new(
            store.clone(),
            store,
            Notifier::disabled(),
            vec!["mcq".into()],
        );
        assert!(controller.is_heavy("mcq"));
        assert!(controller.is_heavy("image"));
        assert!(!controller.is_heavy("chat"));
        assert_eq!(controller.classify_feature("mcq"), RouteClass::Heavy);
    }

    #[tokio::test]
    async fn malformed_flag_reads_as_inactive() {
        let (controller, store, _) = controller();
        store
            .set_flag(MAINTENANCE_FLAG, "corrupted {", None)
            .await
            .unwrap();
        assert!(controller.current().await.unwrap().is_none());
        controller
            .check_request(RouteClass::Standard, false)
            .await
            .unwrap();
    }
}
