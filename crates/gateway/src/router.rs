use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use vaidya_crypto::ExposeSecret;
use vaidya_notify::{Notifier, NotifyEvent};
use vaidya_provider::{CompletionRequest, ProviderAdapter};
use vaidya_store::UserStore;

use crate::credentials::CredentialService;
use crate::error::GatewayError;
use crate::maintenance::MaintenanceController;

/// Provider used when no provider holds an active credential for a feature.
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Default number of shared-pool attempts per request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One attempt within a routed request, for operator diagnosis.
#[derive(Debug, Clone, Serialize)]
pub struct RouteAttempt {
    /// 1-based attempt number, counting a personal-key attempt first.
    pub attempt: u32,
    /// Credential id, or `user_<id>` for a personal key.
    pub key_id: String,
    /// Error text for failed attempts; `None` on the successful one.
    pub error: Option<String>,
}

/// A completed routed request.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    /// Generated text.
    pub content: String,
    /// Tokens consumed.
    pub tokens_used: u64,
    /// The concrete model that served the request.
    pub model_id: String,
    /// The credential that succeeded.
    pub key_id: String,
    /// Total attempts made, including any personal-key attempt.
    pub attempts: u32,
    /// Whether the user's personal key served the request.
    pub used_user_key: bool,
    /// Per-attempt attribution in order.
    pub attempts_log: Vec<RouteAttempt>,
}

/// Routes logical requests onto the credential pool with fallback.
///
/// Selection is deterministic for a given pool snapshot: the user's personal
/// key first when present, then shared active credentials in
/// `(priority DESC, created_at DESC)` order, at most `max_retries` of them.
/// On pool exhaustion the maintenance controller is consulted.
#[derive(Clone)]
pub struct ModelRouter {
    credentials: CredentialService,
    users: Arc<dyn UserStore>,
    adapter: Arc<dyn ProviderAdapter>,
    maintenance: MaintenanceController,
    notifier: Notifier,
    max_retries: u32,
}

impl ModelRouter {
    /// Build the router.
    #[must_use]
    pub fn new(
        credentials: CredentialService,
        users: Arc<dyn UserStore>,
        adapter: Arc<dyn ProviderAdapter>,
        maintenance: MaintenanceController,
        notifier: Notifier,
        max_retries: u32,
    ) -> Self {
        Self {
            credentials,
            users,
            adapter,
            maintenance,
            notifier,
            max_retries,
        }
    }

    /// The provider to draw shared credentials from: whichever provider has
    /// the best active credential for the feature, else the default.
    pub async fn select_provider(&self, feature: &str) -> String {
        match self.credentials.providers_with_active(feature).await {
            Ok(providers) => providers
                .into_iter()
                .next()
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_owned()),
            Err(e) => {
                warn!(feature, error = %e, "provider selection failed; using default");
                DEFAULT_PROVIDER.to_owned()
            }
        }
    }

    /// The user's decrypted personal key, if the row carries one that
    /// decrypts. Decryption failures are logged and treated as absent.
    async fn user_key(&self, user_id: &str) -> Option<String> {
        let user = match self.users.get_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id, error = %e, "user lookup for personal key failed");
                return None;
            }
        };
        let ciphertext = user.personal_api_key?;
        match self.credentials.decrypt_secret(&ciphertext) {
            Ok(secret) => Some(secret.expose_secret().clone()),
            Err(e) => {
                warn!(user_id, error = %e, "personal key is undecryptable; ignoring");
                None
            }
        }
    }

    /// Route one request: personal key first, then the shared pool in
    /// priority order, with failure attribution and fallback notification.
    #[instrument(skip(self, request), fields(feature = %request.feature))]
    pub async fn route(
        &self,
        user_id: Option<&str>,
        request: CompletionRequest,
    ) -> Result<RouteOutcome, GatewayError> {
        let feature = request.feature.clone();
        let mut attempts_log: Vec<RouteAttempt> = Vec::new();

        // Personal key first. A failure here is recorded and logged but
        // never disables the user's key; that is an explicit user action.
        let user_key_id = user_id.map(|id| format!("user_{id}"));
        let mut user_key_tried = false;
        if let Some(user_id) = user_id {
            if let Some(secret) = self.user_key(user_id).await {
                user_key_tried = true;
                let key_id = user_key_id.clone().unwrap_or_default();
                info!(%key_id, "attempt 1: trying personal API key");
                match self.adapter.complete(&secret, &request).await {
                    Ok(completion) => {
                        attempts_log.push(RouteAttempt {
                            attempt: 1,
                            key_id: key_id.clone(),
                            error: None,
                        });
                        return Ok(RouteOutcome {
                            content: completion.content,
                            tokens_used: completion.tokens_used,
                            model_id: completion.model_id,
                            key_id,
                            attempts: 1,
                            used_user_key: true,
                            attempts_log,
                        });
                    }
                    Err(e) => {
                        warn!(%key_id, error = %e, "personal key failed; falling back to shared pool");
                        attempts_log.push(RouteAttempt {
                            attempt: 1,
                            key_id,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        let starting_attempt = u32::from(user_key_tried);
        let provider = self.select_provider(&feature).await;
        let keys = self.credentials.all_active(&provider, &feature).await?;

        if keys.is_empty() {
            warn!(provider, feature, "no active credentials available");
            self.maintenance
                .trigger_if_needed(&feature, starting_attempt)
                .await;
            return Err(GatewayError::RoutingFailed {
                message: "no API keys available for this feature".to_owned(),
                attempts: starting_attempt,
                token_limit: false,
            });
        }

        let max_attempts = keys.len().min(self.max_retries as usize);
        info!(
            provider,
            feature,
            available = keys.len(),
            max_attempts,
            user_key_tried,
            "routing with fallback"
        );

        let mut last_error = String::new();
        let mut last_token_limit = false;

        for (index, key) in keys.iter().take(max_attempts).enumerate() {
            let attempt = starting_attempt + index as u32 + 1;
            let key_id = key.credential.id.clone();
            info!(%key_id, attempt, priority = key.credential.priority, "trying credential");

            match self
                .adapter
                .complete(key.secret.expose_secret(), &request)
                .await
            {
                Ok(completion) => {
                    attempts_log.push(RouteAttempt {
                        attempt,
                        key_id: key_id.clone(),
                        error: None,
                    });
                    let _ = self.credentials.record_success(&key_id).await;
                    self.credentials.touch_last_used(&key_id).await;

                    // Any earlier attempt means this success is a fallback.
                    if index > 0 || user_key_tried {
                        let from_key_id = if user_key_tried && index == 0 {
                            user_key_id.clone().unwrap_or_default()
                        } else {
                            keys[0].credential.id.clone()
                        };
                        self.notifier
                            .publish(&NotifyEvent::Fallback {
                                from_key_id,
                                to_key_id: key_id.clone(),
                                provider: provider.clone(),
                                feature: feature.clone(),
                                timestamp: Utc::now(),
                            })
                            .await;
                    }

                    info!(%key_id, attempt, tokens = completion.tokens_used, "request succeeded");
                    return Ok(RouteOutcome {
                        content: completion.content,
                        tokens_used: completion.tokens_used,
                        model_id: completion.model_id,
                        key_id,
                        attempts: attempt,
                        used_user_key: false,
                        attempts_log,
                    });
                }
                Err(e) => {
                    warn!(%key_id, attempt, error = %e, "credential failed");
                    last_token_limit = e.is_token_limit();
                    last_error = e.to_string();
                    attempts_log.push(RouteAttempt {
                        attempt,
                        key_id: key_id.clone(),
                        error: Some(last_error.clone()),
                    });
                    if let Err(record_err) =
                        self.credentials.record_failure(&key_id, &last_error).await
                    {
                        warn!(%key_id, error = %record_err, "failed to record credential failure");
                    }
                }
            }
        }

        let attempts = starting_attempt + max_attempts as u32;
        warn!(provider, feature, attempts, "all credentials failed");
        self.maintenance.trigger_if_needed(&feature, attempts).await;

        Err(GatewayError::RoutingFailed {
            message: last_error,
            attempts,
            token_limit: last_token_limit,
        })
    }
}
