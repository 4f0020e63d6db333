//! HTTP-level tests over the assembled router with the in-memory backend
//! and a scripted provider adapter.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vaidya_audit::MemoryAuditStore;
use vaidya_core::{AllowlistEntry, Role};
use vaidya_crypto::{parse_master_key, CredentialCipher};
use vaidya_embedding::MockEmbeddingProvider;
use vaidya_gateway::{
    AccountService, AdminService, ChatService, CommandService, CredentialService,
    DocumentPipeline, FeatureGate, HealthMonitor, MaintenanceController, ModelRouter,
    RateLimiter,
};
use vaidya_notify::Notifier;
use vaidya_provider::{MockAdapter, ModelCatalog};
use vaidya_server::{build_router, AppState, ServerConfig};
use vaidya_store::{MemoryBlobStore, MemoryStore, UserStore as _};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    adapter: Arc<MockAdapter>,
    credentials: CredentialService,
}

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".into(),
        encryption_key: "42".repeat(32),
        super_admin_email: None,
        database_url: None,
        jwt_secret: "test-jwt-secret".into(),
        session_ttl: Duration::from_secs(3600),
        smtp_host: None,
        smtp_port: 587,
        smtp_user: None,
        smtp_password: None,
        from_email: None,
        admin_emails: vec![],
        webhook_url: None,
        health_check_interval: Duration::from_secs(300),
        provider_timeout: Duration::from_secs(5),
        max_retries: 3,
        models_config_path: None,
        embedding_endpoint: None,
        embedding_model: "test-model".into(),
        embedding_api_key: None,
        huggingface_api_key: None,
        extra_heavy_features: vec![],
        max_concurrent_ingests: 2,
    }
}

fn app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditStore::new());
    let cipher = Arc::new(CredentialCipher::new(
        parse_master_key(&config.encryption_key).unwrap(),
    ));
    let notifier = Notifier::disabled();
    let adapter = Arc::new(MockAdapter::new());

    let credentials = CredentialService::new(store.clone(), cipher, notifier.clone());
    let maintenance =
        MaintenanceController::new(store.clone(), store.clone(), notifier.clone(), vec![]);
    let router = Arc::new(ModelRouter::new(
        credentials.clone(),
        store.clone(),
        adapter.clone(),
        maintenance.clone(),
        notifier,
        config.max_retries,
    ));
    let limiter = RateLimiter::new(store.clone(), store.clone(), store.clone());
    let gate = FeatureGate::new(store.clone());
    let documents = DocumentPipeline::new(
        store.clone(),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MockEmbeddingProvider::new(vec![1.0, 0.0])),
        router.clone(),
        2,
    );
    let chat = ChatService::new(
        store.clone(),
        store.clone(),
        router.clone(),
        limiter.clone(),
        documents.clone(),
    );
    let commands = CommandService::new(store.clone(), router.clone(), limiter.clone());
    let accounts = AccountService::new(store.clone(), credentials.clone());
    let admin = AdminService::new(
        store.clone(),
        store.clone(),
        audit,
        credentials.clone(),
        limiter.clone(),
        gate.clone(),
        maintenance.clone(),
        store.clone(),
        None,
    );

    // The monitor is exercised in its own crate; here it only needs to exist
    // so the wiring stays honest about what boot constructs.
    let _monitor = HealthMonitor::new(
        credentials.clone(),
        store.clone(),
        store.clone(),
        adapter.clone(),
        None,
        Arc::new(ModelCatalog::default()),
        config.health_check_interval,
    );

    let state = AppState {
        config: Arc::new(config),
        users: store.clone(),
        credentials: credentials.clone(),
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

    TestApp {
        router: build_router(state),
        store,
        adapter,
        credentials,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn json_request(method: &str, path: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn register(router: &Router, email: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            serde_json::json!({
                "email": email,
                "password": "hunter2hunter2",
                "name": "Test User",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    body["session"]["access_token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let app = app();
    let (status, body) = send(&app.router, get_request("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health", None))
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn register_then_login() {
    let app = app();
    register(&app.router, "doc@example.com").await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "email": "doc@example.com", "password": "hunter2hunter2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert!(body["session"]["access_token"].is_string());

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "email": "doc@example.com", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn duplicate_registration_rejected() {
    let app = app();
    register(&app.router, "doc@example.com").await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            serde_json::json!({
                "email": "doc@example.com",
                "password": "hunter2hunter2",
                "name": "Again",
            }),
        ),
    )
    .await;
    assert_ne!(status, StatusCode::OK);
    assert!(body["error"].is_object());
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = app();
    let (status, body) = send(&app.router, get_request("/api/usage", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn chat_flow_end_to_end() {
    let app = app();
    let token = register(&app.router, "doc@example.com").await;

    app.credentials
        .add("openrouter", "chat", "pool-key-secret", 10, "active")
        .await
        .unwrap();
    app.adapter.succeed_for("pool-key-secret", "An answer.", 25);

    let (status, session) = send(
        &app.router,
        json_request(
            "POST",
            "/api/chat/sessions",
            Some(&token),
            serde_json::json!({ "title": "Pharm" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["id"].as_str().unwrap();

    let (status, reply) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/chat/sessions/{session_id}/messages"),
            Some(&token),
            serde_json::json!({ "message": "How does aspirin work?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "An answer.");

    let (status, usage) = send(&app.router, get_request("/api/usage", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["tokens_used"], 25);
    assert_eq!(usage["requests_count"], 1);
}

/// Seed an allowlisted admin directly in the store and log in through the
/// API; roles are provisioned out-of-band, not through registration.
async fn seed_admin(app: &TestApp, email: &str) -> String {
    use chrono::Utc;
    use vaidya_core::{Plan, User};
    use vaidya_server::auth::hash_password;

    app.store
        .insert_user(User {
            id: "admin-1".into(),
            email: email.into(),
            display_name: "Boss".into(),
            plan: Plan::Free,
            role: Some(Role::Admin),
            disabled: false,
            personal_api_key: None,
            password_hash: hash_password("admin-password").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    app.store
        .upsert_allowlist(AllowlistEntry {
            email: email.into(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "email": email, "password": "admin-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    body["session"]["access_token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn feature_toggle_gates_the_path() {
    let app = app();
    let admin_token = seed_admin(&app, "boss@example.com").await;
    let user_token = register(&app.router, "doc@example.com").await;

    app.credentials
        .add("openrouter", "mcq", "mcq-key-secret", 10, "active")
        .await
        .unwrap();
    app.adapter.succeed_for("mcq-key-secret", "Q1: ...", 20);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/admin/features/mcq",
            Some(&admin_token),
            serde_json::json!({ "enabled": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/commands/mcq",
            Some(&user_token),
            serde_json::json!({ "topic": "asthma" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FEATURE_DISABLED");
    assert_eq!(body["error"]["feature"], "mcq");

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/admin/features/mcq",
            Some(&admin_token),
            serde_json::json!({ "enabled": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/commands/mcq",
            Some(&user_token),
            serde_json::json!({ "topic": "asthma" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "mcq");
}

#[tokio::test]
async fn hard_maintenance_gates_chat_but_not_admin_or_health() {
    let app = app();
    let admin_token = seed_admin(&app, "boss@example.com").await;
    let user_token = register(&app.router, "doc@example.com").await;

    // A session created before the outage.
    let (status, session) = send(
        &app.router,
        json_request(
            "POST",
            "/api/chat/sessions",
            Some(&user_token),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["id"].as_str().unwrap().to_owned();

    // Total pool failure: the routed request fails and auto-enters hard
    // maintenance.
    app.credentials
        .add("openrouter", "chat", "dead-key-secret", 10, "disabled")
        .await
        .unwrap();
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/chat/sessions/{session_id}/messages"),
            Some(&user_token),
            serde_json::json!({ "message": "hello" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "ROUTING_FAILED");

    // The gate now rejects ordinary traffic with the maintenance envelope.
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/chat/sessions",
            Some(&user_token),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "MAINTENANCE_MODE");
    assert_eq!(body["error"]["level"], "hard");

    // Health and the admin surface stay up.
    let (status, _) = send(&app.router, get_request("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app.router,
        get_request("/api/admin/maintenance", Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    // Admin exit restores ordinary traffic.
    let (status, _) = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri("/api/admin/maintenance")
            .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/chat/sessions",
            Some(&user_token),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
