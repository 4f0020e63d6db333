use std::time::Duration;

use crate::error::ServerError;

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8000`.
    pub bind_addr: String,
    /// Symmetric key for credential ciphertext (hex or base64, 32 bytes).
    pub encryption_key: String,
    /// Break-glass admin email, if configured.
    pub super_admin_email: Option<String>,
    /// Postgres URL; the in-memory backend is used when absent.
    pub database_url: Option<String>,
    /// Secret for signing session tokens.
    pub jwt_secret: String,
    /// Session lifetime.
    pub session_ttl: Duration,

    /// SMTP settings; email notifications are enabled when all are present.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,
    /// Admin notification recipients (comma-separated in the environment).
    pub admin_emails: Vec<String>,
    /// Webhook notification target, if configured.
    pub webhook_url: Option<String>,

    /// Credential probe interval.
    pub health_check_interval: Duration,
    /// Provider adapter timeout.
    pub provider_timeout: Duration,
    /// Maximum shared-pool attempts per routed request.
    pub max_retries: u32,
    /// Path to the static feature-to-model catalog JSON.
    pub models_config_path: Option<String>,

    /// Embedding inference endpoint, model and key.
    pub embedding_endpoint: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,

    /// Hugging Face platform token for fallback-model probes.
    pub huggingface_api_key: Option<String>,

    /// Extra features an operator marks heavy for soft maintenance.
    pub extra_heavy_features: Vec<String>,
    /// Concurrent document ingests.
    pub max_concurrent_ingests: usize,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

impl ServerConfig {
    /// Read the configuration from the environment.
    ///
    /// `ENCRYPTION_KEY` and `JWT_SECRET` are required; everything else has a
    /// default or disables its subsystem when absent.
    pub fn from_env() -> Result<Self, ServerError> {
        let encryption_key = env("ENCRYPTION_KEY")
            .ok_or_else(|| ServerError::Config("ENCRYPTION_KEY must be set".to_owned()))?;
        let jwt_secret = env("JWT_SECRET")
            .ok_or_else(|| ServerError::Config("JWT_SECRET must be set".to_owned()))?;

        Ok(Self {
            bind_addr: env("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_owned()),
            encryption_key,
            super_admin_email: env("SUPER_ADMIN_EMAIL"),
            database_url: env("DATABASE_URL"),
            jwt_secret,
            session_ttl: Duration::from_secs(env_u64("SESSION_TTL_SECS", 86_400)),
            smtp_host: env("SMTP_HOST"),
            smtp_port: u16::try_from(env_u64("SMTP_PORT", 587)).unwrap_or(587),
            smtp_user: env("SMTP_USER"),
            smtp_password: env("SMTP_PASSWORD"),
            from_email: env("FROM_EMAIL"),
            admin_emails: env_list("ADMIN_EMAILS"),
            webhook_url: env("WEBHOOK_URL"),
            health_check_interval: Duration::from_secs(env_u64(
                "HEALTH_CHECK_INTERVAL_SECS",
                300,
            )),
            provider_timeout: Duration::from_secs(env_u64("PROVIDER_TIMEOUT_SECS", 60)),
            max_retries: u32::try_from(env_u64("ROUTER_MAX_RETRIES", 3)).unwrap_or(3),
            models_config_path: env("MODELS_CONFIG_PATH"),
            embedding_endpoint: env("EMBEDDING_ENDPOINT"),
            embedding_model: env("EMBEDDING_MODEL")
                .unwrap_or_else(|| "sentence-transformers/all-mpnet-base-v2".to_owned()),
            embedding_api_key: env("EMBEDDING_API_KEY"),
            huggingface_api_key: env("HUGGINGFACE_API_KEY"),
            extra_heavy_features: env_list("HEAVY_FEATURES"),
            max_concurrent_ingests: usize::try_from(env_u64("MAX_CONCURRENT_INGESTS", 4))
                .unwrap_or(4),
        })
    }
}
