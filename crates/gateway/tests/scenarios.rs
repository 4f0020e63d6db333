//! End-to-end scenarios across the assembled core, using the in-memory
//! store, scripted adapter, mapping embedder and capturing notification
//! sink.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, Utc};

use vaidya_audit::MemoryAuditStore;
use vaidya_core::{
    features, AllowlistEntry, CredentialStatus, Document, EmbeddingRow, FileType, MessageRole,
    Plan, ProcessingStatus, Role, User,
};
use vaidya_crypto::{parse_master_key, CredentialCipher};
use vaidya_embedding::MappingEmbeddingProvider;
use vaidya_gateway::{
    AdminService, ChatService, CommandService, CredentialService, DocumentPipeline, FeatureGate,
    GatewayError, MaintenanceController, ModelRouter, RateLimiter,
};
use vaidya_notify::{CapturingSink, Notifier, NotifyEvent};
use vaidya_provider::{CompletionRequest, MockAdapter};
use vaidya_store::{
    CredentialStore as _, DocumentStore as _, MemoryBlobStore, MemoryStore, UsageStore as _,
    UserStore as _,
};

struct Harness {
    store: Arc<MemoryStore>,
    adapter: Arc<MockAdapter>,
    sink: Arc<CapturingSink>,
    credentials: CredentialService,
    router: Arc<ModelRouter>,
    gate: FeatureGate,
    chat: ChatService,
    commands: CommandService,
    admin: AdminService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditStore::new());
    let cipher = Arc::new(CredentialCipher::new(
        parse_master_key(&"42".repeat(32)).unwrap(),
    ));
    let sink = Arc::new(CapturingSink::new());
    let notifier = Notifier::new(vec![sink.clone()]);

    let credentials = CredentialService::new(store.clone(), cipher, notifier.clone());
    let maintenance =
        MaintenanceController::new(store.clone(), store.clone(), notifier.clone(), vec![]);
    let adapter = Arc::new(MockAdapter::new());
    let router = Arc::new(ModelRouter::new(
        credentials.clone(),
        store.clone(),
        adapter.clone(),
        maintenance.clone(),
        notifier.clone(),
        3,
    ));
    let limiter = RateLimiter::new(store.clone(), store.clone(), store.clone());
    let gate = FeatureGate::new(store.clone());

    let mut mappings = HashMap::new();
    mappings.insert("aspirin".to_owned(), vec![1.0, 0.0]);
    mappings.insert("Aspirin".to_owned(), vec![1.0, 0.0]);
    let embedder = Arc::new(MappingEmbeddingProvider::new(mappings, 2));

    let documents = DocumentPipeline::new(
        store.clone(),
        Arc::new(MemoryBlobStore::new()),
        embedder,
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
    let admin = AdminService::new(
        store.clone(),
        store.clone(),
        audit,
        credentials.clone(),
        limiter,
        gate.clone(),
        maintenance,
        store.clone(),
        None,
    );

    Harness {
        store,
        adapter,
        sink,
        credentials,
        router,
        gate,
        chat,
        commands,
        admin,
    }
}

async fn seed_user(store: &MemoryStore, id: &str, plan: Plan, role: Option<Role>) {
    store
        .insert_user(User {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: id.into(),
            plan,
            role,
            disabled: false,
            personal_api_key: None,
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
}

async fn seed_admin(store: &MemoryStore, id: &str) {
    seed_user(store, id, Plan::Free, Some(Role::Admin)).await;
    store
        .upsert_allowlist(AllowlistEntry {
            email: format!("{id}@example.com"),
            role: Role::Admin,
        })
        .await
        .unwrap();
}

// Scenario A: the second key serves the request after the first fails.
#[tokio::test]
async fn fallback_succeeds_on_second_key() {
    let h = harness();
    seed_user(&h.store, "U", Plan::Pro, None).await;
    let k1 = h
        .credentials
        .add("openrouter", "chat", "key-one-secret", 10, "active")
        .await
        .unwrap();
    let k2 = h
        .credentials
        .add("openrouter", "chat", "key-two-secret", 5, "active")
        .await
        .unwrap();
    h.adapter.fail_for("key-one-secret", 500, "upstream exploded");
    h.adapter.succeed_for("key-two-secret", "hello back", 10);

    let outcome = h
        .router
        .route(Some("U"), CompletionRequest::new(features::CHAT, "hello"))
        .await
        .unwrap();

    assert_eq!(outcome.key_id, k2.id);
    assert_eq!(outcome.attempts, 2);
    assert!(!outcome.used_user_key);

    let k1_row = h.store.get_credential(&k1.id).await.unwrap().unwrap();
    assert_eq!(k1_row.failure_count, 1);

    let fallbacks = h.sink.events_of_kind("fallback");
    assert_eq!(fallbacks.len(), 1);
    match &fallbacks[0] {
        NotifyEvent::Fallback {
            from_key_id,
            to_key_id,
            ..
        } => {
            assert_eq!(from_key_id, &k1.id);
            assert_eq!(to_key_id, &k2.id);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

// Scenario B: a fully disabled pool drives the system into hard maintenance.
#[tokio::test]
async fn total_failure_enters_hard_maintenance() {
    let h = harness();
    for secret in ["key-one-secret", "key-two-secret"] {
        h.credentials
            .add("openrouter", "chat", secret, 5, "disabled")
            .await
            .unwrap();
    }

    let err = h
        .router
        .route(None, CompletionRequest::new(features::CHAT, "hello"))
        .await
        .unwrap_err();
    match err {
        GatewayError::RoutingFailed { attempts, .. } => assert_eq!(attempts, 0),
        other => panic!("unexpected error: {other:?}"),
    }

    let events = h.sink.events_of_kind("maintenance_triggered");
    assert_eq!(events.len(), 1);
    match &events[0] {
        NotifyEvent::MaintenanceTriggered { level, reason, .. } => {
            assert_eq!(level, "hard");
            assert!(reason.contains("total key failure"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

// Scenario C: quota rejection happens before any provider call.
#[tokio::test]
async fn quota_rejection_precedes_routing() {
    let h = harness();
    seed_user(&h.store, "U", Plan::Free, None).await;
    let today = Local::now().date_naive();
    h.store.apply_usage("U", today, 10_000, "chat").await.unwrap();

    h.credentials
        .add("openrouter", "chat", "key-one-secret", 10, "active")
        .await
        .unwrap();
    h.adapter.succeed_for("key-one-secret", "never sent", 1);

    let session = h.chat.create_session("U", None).await.unwrap();
    let err = h.chat.send_message("U", &session.id, "hello").await.unwrap_err();

    match err {
        GatewayError::QuotaExceeded { usage } => assert_eq!(usage.tokens_used, 10_000),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.adapter.call_count(), 0);
}

// Scenario D: an admin role bypasses quota and routes normally.
#[tokio::test]
async fn admin_role_bypasses_quota() {
    let h = harness();
    seed_user(&h.store, "root", Plan::Free, Some(Role::Admin)).await;
    let today = Local::now().date_naive();
    h.store
        .apply_usage("root", today, 999_999, "chat")
        .await
        .unwrap();

    h.credentials
        .add("openrouter", "chat", "key-one-secret", 10, "active")
        .await
        .unwrap();
    h.adapter.succeed_for("key-one-secret", "served", 5);

    let session = h.chat.create_session("root", None).await.unwrap();
    let reply = h.chat.send_message("root", &session.id, "hello").await.unwrap();
    assert_eq!(reply.content, "served");
    assert_eq!(h.adapter.call_count(), 1);
}

// Scenario E: the feature toggle gates the command path both ways.
#[tokio::test]
async fn feature_toggle_gates_commands() {
    let h = harness();
    seed_admin(&h.store, "boss").await;
    seed_user(&h.store, "U", Plan::Student, None).await;
    h.credentials
        .add("openrouter", "mcq", "mcq-key-secret", 10, "active")
        .await
        .unwrap();
    h.adapter.succeed_for("mcq-key-secret", "Q1: ...", 20);

    h.admin.toggle_feature("boss", "mcq", false).await.unwrap();
    let err = h.gate.check_path("/api/commands/mcq").await.unwrap_err();
    match err {
        GatewayError::FeatureDisabled { feature } => assert_eq!(feature, "mcq"),
        other => panic!("unexpected error: {other:?}"),
    }

    h.admin.toggle_feature("boss", "mcq", true).await.unwrap();
    h.gate.check_path("/api/commands/mcq").await.unwrap();
    let output = h.commands.generate("U", features::MCQ, "asthma").await.unwrap();
    assert_eq!(output.command, "mcq");
}

// Scenario F: retrieval grounds the reply and records citations.
#[tokio::test]
async fn chat_cites_retrieved_document() {
    let h = harness();
    seed_user(&h.store, "U", Plan::Pro, None).await;
    h.credentials
        .add("openrouter", "chat", "chat-key-secret", 10, "active")
        .await
        .unwrap();
    h.adapter
        .succeed_for("chat-key-secret", "It inhibits COX-1.", 30);

    // A completed document with one content chunk and a sentinel summary.
    h.store
        .insert_document(Document {
            id: "doc-a".into(),
            user_id: "U".into(),
            filename: "A.pdf".into(),
            file_type: FileType::Pdf,
            size_bytes: 1024,
            storage_path: "documents/U/doc-a".into(),
            processing_status: ProcessingStatus::Completed,
            processing_error: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    h.store
        .insert_embeddings(vec![
            EmbeddingRow {
                id: "e1".into(),
                document_id: "doc-a".into(),
                chunk_text: "Aspirin inhibits COX-1".into(),
                chunk_index: 4,
                vector: vec![1.0, 0.0],
            },
            EmbeddingRow {
                id: "e2".into(),
                document_id: "doc-a".into(),
                chunk_text: "High-Yield Summary of A.pdf".into(),
                chunk_index: -1,
                vector: vec![1.0, 0.0],
            },
        ])
        .await
        .unwrap();

    let session = h.chat.create_session("U", None).await.unwrap();
    let reply = h
        .chat
        .send_message("U", &session.id, "How does aspirin work?")
        .await
        .unwrap();

    assert_eq!(reply.role, MessageRole::Assistant);
    let citations = reply.citations.expect("reply should carry citations");
    assert!(!citations.is_empty());
    let citation = &citations[0];
    assert_eq!(citation.document_filename, "A.pdf");
    assert_eq!(citation.chunk_index, 4);
    assert!(citation.similarity_score > 0.0);

    // The sentinel summary chunk never surfaces through retrieval.
    assert!(citations.iter().all(|c| c.chunk_index != -1));

    // The routed prompt contained the retrieved excerpt.
    let call = &h.adapter.calls()[0];
    assert_eq!(call.feature, "chat");
}

// A credential one failure short of the threshold recovers on success and
// promotes on one more failure.
#[tokio::test]
async fn threshold_boundary_behaviour() {
    let h = harness();
    let credential = h
        .credentials
        .add("openrouter", "chat", "boundary-secret", 10, "active")
        .await
        .unwrap();

    h.credentials.record_failure(&credential.id, "e").await.unwrap();
    h.credentials.record_failure(&credential.id, "e").await.unwrap();

    // Success at failure_count = 2 resets to 0.
    h.credentials.record_success(&credential.id).await.unwrap();
    let row = h.store.get_credential(&credential.id).await.unwrap().unwrap();
    assert_eq!(row.failure_count, 0);
    assert_eq!(row.status, CredentialStatus::Active);

    // Back to 2, then a third consecutive failure promotes.
    h.credentials.record_failure(&credential.id, "e").await.unwrap();
    h.credentials.record_failure(&credential.id, "e").await.unwrap();
    h.credentials.record_failure(&credential.id, "e").await.unwrap();
    let row = h.store.get_credential(&credential.id).await.unwrap().unwrap();
    assert_eq!(row.status, CredentialStatus::Degraded);
}

// Semantic search with no completed documents is empty, not an error.
#[tokio::test]
async fn search_without_documents_is_empty() {
    let h = harness();
    seed_user(&h.store, "U", Plan::Pro, None).await;
    let session = h.chat.create_session("U", None).await.unwrap();

    h.credentials
        .add("openrouter", "chat", "chat-key-secret", 10, "active")
        .await
        .unwrap();
    h.adapter.succeed_for("chat-key-secret", "plain answer", 10);

    let reply = h.chat.send_message("U", &session.id, "hello").await.unwrap();
    assert!(reply.citations.is_none());
}
