//! HTTP surface and process wiring for the Vaidya core.
//!
//! The server builds the whole object graph at boot (storage backend,
//! cipher, adapter, embedder, notifier, gateway services), mounts the API
//! under `/api`, and owns the health monitor's lifecycle: spawned once after
//! bind, cancelled and joined on shutdown.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vaidya_audit::{AuditStore, MemoryAuditStore};
use vaidya_crypto::{parse_master_key, CredentialCipher};
use vaidya_embedding::{EmbeddingConfig, EmbeddingProvider, HttpEmbeddingProvider};
use vaidya_gateway::{
    AccountService, AdminService, ChatService, CommandService, CredentialService,
    DocumentPipeline, FeatureGate, HealthMonitor, MaintenanceController, ModelRouter,
    RateLimiter,
};
use vaidya_notify::{EmailSink, NotificationSink, Notifier, SmtpConfig, WebhookSink};
use vaidya_provider::{
    HuggingFaceClient, ModelCatalog, OpenRouterAdapter, ProviderAdapter,
};
use vaidya_store::{
    BlobStore, ChatStore, CredentialStore, DocumentStore, FlagStore, HealthCheckStore,
    MemoryBlobStore, MemoryStore, UsageStore, UserStore,
};
use vaidya_store_postgres::PgStore;

pub use config::ServerConfig;
pub use error::ServerError;
pub use state::AppState;

/// Build the notification fan-out from configuration. Sinks that are not
/// fully configured are simply absent.
fn build_notifier(config: &ServerConfig) -> Notifier {
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();

    if let (Some(host), Some(user), Some(password)) = (
        config.smtp_host.clone(),
        config.smtp_user.clone(),
        config.smtp_password.clone(),
    ) {
        if config.admin_emails.is_empty() {
            warn!("SMTP configured but ADMIN_EMAILS is empty; email notifications disabled");
        } else {
            let from = config.from_email.clone().unwrap_or_else(|| user.clone());
            match EmailSink::new(SmtpConfig {
                host,
                port: config.smtp_port,
                username: user,
                password,
                from,
                recipients: config.admin_emails.clone(),
            }) {
                Ok(sink) => sinks.push(Arc::new(sink)),
                Err(e) => warn!(error = %e, "email sink unavailable"),
            }
        }
    }

    if let Some(url) = &config.webhook_url {
        match WebhookSink::new(url.clone()) {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) => warn!(error = %e, "webhook sink unavailable"),
        }
    }

    if sinks.is_empty() {
        warn!("no notification sinks configured; operator alerts will only be logged");
    }
    Notifier::new(sinks)
}

fn build_catalog(config: &ServerConfig) -> Arc<ModelCatalog> {
    match &config.models_config_path {
        Some(path) => match ModelCatalog::from_file(path) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                warn!(path = %path, error = %e, "model catalog unavailable; using defaults");
                Arc::new(ModelCatalog::default())
            }
        },
        None => {
            warn!("MODELS_CONFIG_PATH not set; every feature uses the default model");
            Arc::new(ModelCatalog::default())
        }
    }
}

fn build_embedder(config: &ServerConfig) -> Result<Arc<dyn EmbeddingProvider>, ServerError> {
    let endpoint = config
        .embedding_endpoint
        .clone()
        .unwrap_or_else(|| "https://api-inference.huggingface.co/models".to_owned());
    let api_key = config.embedding_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("EMBEDDING_API_KEY not set; document ingestion will fail until configured");
    }
    let provider = HttpEmbeddingProvider::new(EmbeddingConfig::new(
        endpoint,
        config.embedding_model.clone(),
        api_key,
    ))
    .map_err(|e| ServerError::Config(e.to_string()))?;
    Ok(Arc::new(provider))
}

/// Assemble the application state and health monitor over a storage backend.
#[allow(clippy::type_complexity)]
pub fn assemble<S>(
    config: ServerConfig,
    store: Arc<S>,
    blobs: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditStore>,
) -> Result<(AppState, HealthMonitor), ServerError>
where
    S: UserStore
        + CredentialStore
        + UsageStore
        + FlagStore
        + HealthCheckStore
        + ChatStore
        + DocumentStore
        + Send
        + Sync
        + 'static,
{
    let master_key = parse_master_key(&config.encryption_key)
        .map_err(|e| ServerError::Config(e.to_string()))?;
    let cipher = Arc::new(CredentialCipher::new(master_key));

    let notifier = build_notifier(&config);
    let catalog = build_catalog(&config);
    let adapter: Arc<dyn ProviderAdapter> = Arc::new(
        OpenRouterAdapter::new(catalog.clone(), config.provider_timeout)
            .map_err(|e| ServerError::Config(e.to_string()))?,
    );
    let embedder = build_embedder(&config)?;
    let fallback = config
        .huggingface_api_key
        .as_ref()
        .and_then(|key| {
            HuggingFaceClient::new(key.clone(), config.provider_timeout)
                .map(Arc::new)
                .map_err(|e| warn!(error = %e, "fallback model client unavailable"))
                .ok()
        });

    let users: Arc<dyn UserStore> = store.clone();
    let credential_rows: Arc<dyn CredentialStore> = store.clone();
    let health_rows: Arc<dyn HealthCheckStore> = store.clone();
    let flags: Arc<dyn FlagStore> = store.clone();

    let credentials = CredentialService::new(credential_rows.clone(), cipher, notifier.clone());
    let maintenance = MaintenanceController::new(
        flags.clone(),
        credential_rows.clone(),
        notifier.clone(),
        config.extra_heavy_features.clone(),
    );
    let router = Arc::new(ModelRouter::new(
        credentials.clone(),
        users.clone(),
        adapter.clone(),
        maintenance.clone(),
        notifier.clone(),
        config.max_retries,
    ));
    let limiter = RateLimiter::new(users.clone(), store.clone(), flags.clone());
    let gate = FeatureGate::new(flags.clone());
    let documents = DocumentPipeline::new(
        store.clone(),
        blobs,
        embedder,
        router.clone(),
        config.max_concurrent_ingests,
    );
    let chat = ChatService::new(
        store.clone(),
        users.clone(),
        router.clone(),
        limiter.clone(),
        documents.clone(),
    );
    let commands = CommandService::new(users.clone(), router.clone(), limiter.clone());
    let accounts = AccountService::new(users.clone(), credentials.clone());
    let admin = AdminService::new(
        users.clone(),
        health_rows.clone(),
        audit,
        credentials.clone(),
        limiter.clone(),
        gate.clone(),
        maintenance.clone(),
        flags,
        config.super_admin_email.clone(),
    );

    let monitor = HealthMonitor::new(
        credentials.clone(),
        credential_rows,
        health_rows,
        adapter,
        fallback,
        catalog,
        config.health_check_interval,
    );

    let state = AppState {
        config: Arc::new(config),
        users,
        credentials,
        router,
        limiter,
        gate,
        maintenance,
        chat,
        commands,
        documents,
        accounts,
        admin,
    };
    Ok((state, monitor))
}

/// Build the API router with gates and request tracing installed.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(api::health::health))
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/usage", get(api::account::usage))
        .route(
            "/users/me/api-key",
            put(api::account::set_personal_key).delete(api::account::clear_personal_key),
        )
        .route(
            "/chat/sessions",
            post(api::chat::create_session).get(api::chat::list_sessions),
        )
        .route(
            "/chat/sessions/{id}/messages",
            post(api::chat::send_message).get(api::chat::list_messages),
        )
        .route("/commands/{command}", post(api::commands::generate))
        .route(
            "/documents",
            post(api::documents::upload).get(api::documents::list),
        )
        .route("/documents/search", post(api::documents::search))
        .route("/documents/{id}", delete(api::documents::delete))
        .route(
            "/admin/api-keys",
            post(api::admin::add_api_key).get(api::admin::list_api_keys),
        )
        .route("/admin/api-keys/test", post(api::admin::test_api_key))
        .route(
            "/admin/api-keys/{id}",
            patch(api::admin::update_api_key).delete(api::admin::delete_api_key),
        )
        .route("/admin/users", get(api::admin::list_users))
        .route("/admin/users/{id}/plan", post(api::admin::update_user_plan))
        .route("/admin/users/{id}/disable", post(api::admin::disable_user))
        .route("/admin/users/{id}/enable", post(api::admin::enable_user))
        .route(
            "/admin/users/{id}/reset-usage",
            post(api::admin::reset_user_usage),
        )
        .route(
            "/admin/features",
            get(api::admin::feature_states),
        )
        .route("/admin/features/{name}", post(api::admin::toggle_feature))
        .route(
            "/admin/maintenance",
            post(api::admin::enter_maintenance)
                .delete(api::admin::exit_maintenance)
                .get(api::admin::maintenance_status),
        )
        .route("/admin/audit", get(api::admin::audit_log))
        .route("/admin/health-checks", get(api::admin::health_records));

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::maintenance_gate,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::feature_gate,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until interrupted: bind, spawn the health monitor, serve,
/// then cancel and join the monitor on shutdown.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let bind_addr = config.bind_addr.clone();

    let (state, monitor) = match &config.database_url {
        Some(url) => {
            info!("using Postgres storage backend");
            let store = Arc::new(
                PgStore::connect(url)
                    .await
                    .map_err(vaidya_gateway::GatewayError::from)?,
            );
            let audit: Arc<dyn AuditStore> = store.clone();
            assemble(config, store, Arc::new(MemoryBlobStore::new()), audit)?
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory storage backend");
            let store = Arc::new(MemoryStore::new());
            let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
            assemble(config, store, Arc::new(MemoryBlobStore::new()), audit)?
        }
    };

    let cancel = CancellationToken::new();
    let monitor_handle = monitor.spawn(cancel.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "server listening");

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    cancel.cancel();
    let _ = monitor_handle.await;
    info!("server stopped");
    Ok(())
}
