use sqlx::PgPool;

/// Schema statements, applied in order. All statements are idempotent so the
/// migration can run at every boot.
const STATEMENTS: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS users (
        id                TEXT PRIMARY KEY,
        email             TEXT NOT NULL UNIQUE,
        display_name      TEXT NOT NULL,
        plan              TEXT NOT NULL,
        role              TEXT,
        disabled          BOOLEAN NOT NULL DEFAULT FALSE,
        personal_api_key  TEXT,
        password_hash     TEXT NOT NULL,
        created_at        TIMESTAMPTZ NOT NULL,
        updated_at        TIMESTAMPTZ NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS admin_allowlist (
        email  TEXT PRIMARY KEY,
        role   TEXT NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS api_keys (
        id             TEXT PRIMARY KEY,
        provider       TEXT NOT NULL,
        feature        TEXT NOT NULL,
        key_value      TEXT NOT NULL,
        priority       INTEGER NOT NULL DEFAULT 0,
        status         TEXT NOT NULL,
        failure_count  INTEGER NOT NULL DEFAULT 0,
        last_used_at   TIMESTAMPTZ,
        created_at     TIMESTAMPTZ NOT NULL,
        updated_at     TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_api_keys_selection
     ON api_keys (feature, status, priority DESC, created_at DESC)",
    "
    CREATE TABLE IF NOT EXISTS usage_counters (
        user_id               TEXT NOT NULL,
        date                  DATE NOT NULL,
        tokens_used           BIGINT NOT NULL DEFAULT 0,
        requests_count        BIGINT NOT NULL DEFAULT 0,
        pdf_uploads           BIGINT NOT NULL DEFAULT 0,
        mcqs_generated        BIGINT NOT NULL DEFAULT 0,
        images_used           BIGINT NOT NULL DEFAULT 0,
        flashcards_generated  BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, date)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS system_flags (
        flag_name   TEXT PRIMARY KEY,
        flag_value  TEXT NOT NULL,
        updated_by  TEXT,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS provider_health (
        id             TEXT PRIMARY KEY,
        api_key_id     TEXT NOT NULL,
        checked_at     TIMESTAMPTZ NOT NULL,
        status         TEXT NOT NULL,
        latency_ms     BIGINT,
        error_message  TEXT
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_provider_health_key_time
     ON provider_health (api_key_id, checked_at DESC)",
    "
    CREATE TABLE IF NOT EXISTS chat_sessions (
        id          TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL,
        title       TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user
     ON chat_sessions (user_id, updated_at DESC)",
    "
    CREATE TABLE IF NOT EXISTS messages (
        id           TEXT PRIMARY KEY,
        session_id   TEXT NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
        role         TEXT NOT NULL,
        content      TEXT NOT NULL,
        tokens_used  BIGINT,
        citations    JSONB,
        created_at   TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_messages_session
     ON messages (session_id, created_at)",
    "
    CREATE TABLE IF NOT EXISTS documents (
        id                 TEXT PRIMARY KEY,
        user_id            TEXT NOT NULL,
        filename           TEXT NOT NULL,
        file_type          TEXT NOT NULL,
        size_bytes         BIGINT NOT NULL,
        storage_path       TEXT NOT NULL,
        processing_status  TEXT NOT NULL,
        processing_error   TEXT,
        created_at         TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_documents_user
     ON documents (user_id, created_at DESC)",
    "
    CREATE TABLE IF NOT EXISTS embeddings (
        id           TEXT PRIMARY KEY,
        document_id  TEXT NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
        chunk_text   TEXT NOT NULL,
        chunk_index  INTEGER NOT NULL,
        embedding    REAL[] NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_document
     ON embeddings (document_id, chunk_index)",
    "
    CREATE TABLE IF NOT EXISTS audit_log (
        id           TEXT PRIMARY KEY,
        admin_id     TEXT NOT NULL,
        action_type  TEXT NOT NULL,
        target_type  TEXT NOT NULL,
        target_id    TEXT NOT NULL,
        details      JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at   TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_time
     ON audit_log (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_admin
     ON audit_log (admin_id, created_at DESC)",
];

/// Create every table and index if it does not already exist.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
