use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use vaidya_audit::{AuditPage, AuditQuery, AuditRecord, AuditStore};
use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::{feature_flag_name, Credential, MaintenanceState, Plan, User};
use vaidya_store::{HealthCheckStore, UserStore};

use crate::credentials::{CredentialService, MIN_SECRET_LEN};
use crate::error::GatewayError;
use crate::features::FeatureGate;
use crate::maintenance::MaintenanceController;
use crate::quota::RateLimiter;

/// An authorized administrative caller.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub user: User,
    /// True when authority came from the break-glass emergency email rather
    /// than the allowlist-plus-role rule.
    pub break_glass: bool,
}

/// Result of a credential validation test (no persistence).
#[derive(Debug, Clone, Serialize)]
pub struct KeyTestResult {
    pub valid: bool,
    pub message: String,
}

/// The administrative mutation surface. Every mutation is authorized by the
/// allowlist-plus-role rule (or the break-glass email) and appends exactly
/// one audit record.
///
/// Audit write failures never roll back the mutation; they are logged at
/// error severity.
#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserStore>,
    health: Arc<dyn HealthCheckStore>,
    audit: Arc<dyn AuditStore>,
    credentials: CredentialService,
    limiter: RateLimiter,
    gate: FeatureGate,
    maintenance: MaintenanceController,
    flags: Arc<dyn vaidya_store::FlagStore>,
    super_admin_email: Option<String>,
}

impl AdminService {
    /// Build the service.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        health: Arc<dyn HealthCheckStore>,
        audit: Arc<dyn AuditStore>,
        credentials: CredentialService,
        limiter: RateLimiter,
        gate: FeatureGate,
        maintenance: MaintenanceController,
        flags: Arc<dyn vaidya_store::FlagStore>,
        super_admin_email: Option<String>,
    ) -> Self {
        Self {
            users,
            health,
            audit,
            credentials,
            limiter,
            gate,
            maintenance,
            flags,
            super_admin_email,
        }
    }

    /// Establish admin authority for a caller.
    ///
    /// Authority requires a matching allowlist entry AND a non-null role on
    /// the user row. The configured emergency email bypasses both and acts
    /// as super admin; its use is flagged on every audit record it produces.
    pub async fn authorize(&self, user_id: &str) -> Result<AdminIdentity, GatewayError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::Unauthorized("unknown user".to_owned()))?;
        if user.disabled {
            return Err(GatewayError::AccountDisabled);
        }

        if let Some(email) = &self.super_admin_email {
            if user.email.eq_ignore_ascii_case(email) {
                warn!(user_id, "break-glass admin access via emergency email");
                return Ok(AdminIdentity {
                    user,
                    break_glass: true,
                });
            }
        }

        if user.role.is_none() {
            return Err(GatewayError::Forbidden(
                "user has no administrative role".to_owned(),
            ));
        }
        if self.users.allowlist_role(&user.email).await?.is_none() {
            return Err(GatewayError::Forbidden(
                "user is not on the admin allowlist".to_owned(),
            ));
        }

        Ok(AdminIdentity {
            user,
            break_glass: false,
        })
    }

    /// Append one audit record. Failures are logged, never propagated.
    async fn log_action(
        &self,
        identity: &AdminIdentity,
        action_type: &str,
        target_type: &str,
        target_id: &str,
        mut details: serde_json::Value,
    ) {
        if identity.break_glass {
            if let Some(object) = details.as_object_mut() {
                object.insert("break_glass".to_owned(), json!(true));
            }
        }
        let record = AuditRecord::new(
            identity.user.id.clone(),
            action_type,
            target_type,
            target_id,
            details,
        );
        if let Err(e) = self.audit.record(record).await {
            error!(
                admin_id = %identity.user.id,
                action_type,
                target_id,
                error = %e,
                "audit write failed; mutation is already committed"
            );
        }
    }

    // -- User management ----------------------------------------------------

    /// Change a user's plan.
    #[instrument(skip(self))]
    pub async fn update_user_plan(
        &self,
        admin_id: &str,
        user_id: &str,
        plan: &str,
    ) -> Result<User, GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let plan = Plan::from_str(plan).map_err(|e| GatewayError::InvalidInput(e.to_string()))?;

        let before = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))?;
        self.users.set_plan(user_id, plan).await?;

        self.log_action(
            &identity,
            "update_user_plan",
            "user",
            user_id,
            json!({ "old_plan": before.plan, "new_plan": plan }),
        )
        .await;

        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))
    }

    /// Zero a user's usage counters for a date.
    #[instrument(skip(self))]
    pub async fn reset_user_usage(
        &self,
        admin_id: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<(), GatewayError> {
        let identity = self.authorize(admin_id).await?;
        self.limiter.reset(user_id, date).await?;
        self.log_action(
            &identity,
            "reset_user_usage",
            "user",
            user_id,
            json!({ "date": date }),
        )
        .await;
        Ok(())
    }

    /// Disable or re-enable a user account.
    #[instrument(skip(self))]
    pub async fn set_user_disabled(
        &self,
        admin_id: &str,
        user_id: &str,
        disabled: bool,
    ) -> Result<(), GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let before = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))?;
        self.users.set_disabled(user_id, disabled).await?;

        let action = if disabled { "disable_user" } else { "enable_user" };
        self.log_action(
            &identity,
            action,
            "user",
            user_id,
            json!({ "old_disabled": before.disabled, "new_disabled": disabled }),
        )
        .await;
        info!(admin_id, user_id, disabled, "user disabled flag changed");
        Ok(())
    }

    /// Users, newest first, bounded.
    pub async fn list_users(&self, admin_id: &str, limit: u32) -> Result<Vec<User>, GatewayError> {
        self.authorize(admin_id).await?;
        Ok(self.users.list_users(limit).await?)
    }

    // -- Credential management ----------------------------------------------

    /// Add a pooled credential.
    #[instrument(skip(self, key))]
    pub async fn add_api_key(
        &self,
        admin_id: &str,
        provider: &str,
        feature: &str,
        key: &str,
        priority: i32,
        status: &str,
    ) -> Result<Credential, GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let credential = self
            .credentials
            .add(provider, feature, key, priority, status)
            .await?;

        self.log_action(
            &identity,
            "add_api_key",
            "api_key",
            &credential.id,
            json!({
                "provider": provider,
                "feature": feature,
                "priority": priority,
                "status": status,
            }),
        )
        .await;
        Ok(credential)
    }

    /// List pooled credentials (ciphertext opaque).
    pub async fn list_api_keys(&self, admin_id: &str) -> Result<Vec<Credential>, GatewayError> {
        self.authorize(admin_id).await?;
        self.credentials.list().await
    }

    /// Update a credential's status and optionally its priority.
    #[instrument(skip(self))]
    pub async fn update_key_status(
        &self,
        admin_id: &str,
        key_id: &str,
        status: &str,
        priority: Option<i32>,
    ) -> Result<Credential, GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let before = self.credentials.get(key_id).await?;
        let after = self.credentials.update_status(key_id, status, priority).await?;

        let mut details = json!({
            "provider": after.provider,
            "feature": after.feature,
            "old_status": before.status,
            "new_status": after.status,
        });
        if priority.is_some() {
            details["old_priority"] = json!(before.priority);
            details["new_priority"] = json!(after.priority);
        }
        self.log_action(&identity, "update_key_status", "api_key", key_id, details)
            .await;
        Ok(after)
    }

    /// Delete a credential.
    #[instrument(skip(self))]
    pub async fn delete_api_key(&self, admin_id: &str, key_id: &str) -> Result<(), GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let before = self.credentials.get(key_id).await?;
        self.credentials.delete(key_id).await?;

        self.log_action(
            &identity,
            "delete_api_key",
            "api_key",
            key_id,
            json!({ "provider": before.provider, "feature": before.feature }),
        )
        .await;
        Ok(())
    }

    /// Validate a credential's shape without persisting anything.
    #[instrument(skip(self, key))]
    pub async fn test_api_key(
        &self,
        admin_id: &str,
        key: &str,
        provider: &str,
    ) -> Result<KeyTestResult, GatewayError> {
        let identity = self.authorize(admin_id).await?;

        let result = if key.len() < MIN_SECRET_LEN {
            KeyTestResult {
                valid: false,
                message: "API key appears to be invalid (too short)".to_owned(),
            }
        } else if provider == "openai" && !key.starts_with("sk-") {
            KeyTestResult {
                valid: false,
                message: "OpenAI API keys typically start with 'sk-'".to_owned(),
            }
        } else if provider == "huggingface" && !key.starts_with("hf_") {
            KeyTestResult {
                valid: false,
                message: "Hugging Face API keys typically start with 'hf_'".to_owned(),
            }
        } else {
            KeyTestResult {
                valid: true,
                message: "API key format appears valid".to_owned(),
            }
        };

        self.log_action(
            &identity,
            "test_api_key",
            "api_key",
            "validation-only",
            json!({ "provider": provider, "valid": result.valid }),
        )
        .await;
        Ok(result)
    }

    // -- Feature toggles and flags ------------------------------------------

    /// Switch a feature on or off globally.
    #[instrument(skip(self))]
    pub async fn toggle_feature(
        &self,
        admin_id: &str,
        feature: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        let identity = self.authorize(admin_id).await?;
        self.flags
            .set_flag(
                &feature_flag_name(feature),
                if enabled { "true" } else { "false" },
                Some(admin_id),
            )
            .await?;

        self.log_action(
            &identity,
            "toggle_feature",
            "feature",
            feature,
            json!({ "feature": feature, "enabled": enabled }),
        )
        .await;
        info!(admin_id, feature, enabled, "feature toggled");
        Ok(())
    }

    /// Enabled state of every known feature.
    pub async fn feature_states(
        &self,
        admin_id: &str,
    ) -> Result<Vec<(String, bool)>, GatewayError> {
        self.authorize(admin_id).await?;
        self.gate.all_states().await
    }

    /// Set an arbitrary system flag (tunable limits and similar).
    #[instrument(skip(self, value))]
    pub async fn set_system_flag(
        &self,
        admin_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), GatewayError> {
        let identity = self.authorize(admin_id).await?;
        self.flags.set_flag(name, value, Some(admin_id)).await?;
        self.log_action(
            &identity,
            "set_system_flag",
            "flag",
            name,
            json!({ "flag_name": name, "flag_value": value }),
        )
        .await;
        Ok(())
    }

    // -- Maintenance --------------------------------------------------------

    /// Manually enter maintenance mode.
    #[instrument(skip(self, reason))]
    pub async fn enter_maintenance(
        &self,
        admin_id: &str,
        level: &str,
        reason: &str,
        feature: Option<String>,
    ) -> Result<MaintenanceState, GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let state = self
            .maintenance
            .enter(level, reason, feature, Some(admin_id.to_owned()))
            .await?;

        self.log_action(
            &identity,
            "enter_maintenance",
            "maintenance",
            level,
            json!({ "level": level, "reason": reason }),
        )
        .await;
        Ok(state)
    }

    /// Exit maintenance mode. A no-op when not in maintenance.
    #[instrument(skip(self))]
    pub async fn exit_maintenance(
        &self,
        admin_id: &str,
    ) -> Result<Option<MaintenanceState>, GatewayError> {
        let identity = self.authorize(admin_id).await?;
        let previous = self.maintenance.exit(admin_id).await?;

        if let Some(previous) = &previous {
            self.log_action(
                &identity,
                "exit_maintenance",
                "maintenance",
                previous.level.as_str(),
                json!({
                    "previous_level": previous.level,
                    "previous_reason": previous.reason,
                }),
            )
            .await;
        }
        Ok(previous)
    }

    /// Current maintenance state, if active.
    pub async fn maintenance_status(
        &self,
        admin_id: &str,
    ) -> Result<Option<MaintenanceState>, GatewayError> {
        self.authorize(admin_id).await?;
        self.maintenance.current().await
    }

    // -- Listings -----------------------------------------------------------

    /// Query the audit log.
    pub async fn audit_log(
        &self,
        admin_id: &str,
        query: &AuditQuery,
    ) -> Result<AuditPage, GatewayError> {
        self.authorize(admin_id).await?;
        self.audit
            .query(query)
            .await
            .map_err(|e| GatewayError::Store(vaidya_store::StoreError::Backend(e.to_string())))
    }

    /// Recent credential probe records.
    pub async fn health_records(
        &self,
        admin_id: &str,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, GatewayError> {
        self.authorize(admin_id).await?;
        Ok(self.health.recent_health_checks(limit).await?)
    }
}
