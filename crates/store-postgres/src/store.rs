use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::{
    AllowlistEntry, ChatSession, Credential, CredentialStatus, Document, EmbeddingRow, Message,
    Plan, ProcessingStatus, Role, SystemFlag, UsageCounter, User,
};
use vaidya_store::{
    ChatStore, CredentialStore, DocumentStore, FlagStore, HealthCheckStore, StoreError,
    UsageStore, UserStore,
};

use crate::rows::{
    CredentialRow, DocumentRow, EmbeddingDbRow, FlagRow, HealthRow, MessageRow, SessionRow,
    UsageRow, UserRow,
};

fn db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

/// Postgres-backed storage implementing every storage trait on one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres and run schema migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await.map_err(db_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running schema migrations.
    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        crate::migrations::run_migrations(&pool)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// The underlying pool, for health probes.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, plan, role, disabled,
                                personal_api_key, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&user.id)
        .bind(user.email.to_ascii_lowercase())
        .bind(&user.display_name)
        .bind(user.plan.as_str())
        .bind(user.role.map(Role::as_str))
        .bind(user.disabled)
        .bind(&user.personal_api_key)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn set_plan(&self, id: &str, plan: Plan) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET plan = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(plan.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_disabled(&self, id: &str, disabled: bool) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET disabled = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(disabled)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_personal_key(
        &self,
        id: &str,
        ciphertext: Option<String>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET personal_api_key = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(ciphertext)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn allowlist_role(&self, email: &str) -> Result<Option<Role>, StoreError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM admin_allowlist WHERE email = $1")
                .bind(email.to_ascii_lowercase())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        role.as_deref()
            .map(|r| {
                r.parse::<Role>()
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn upsert_allowlist(&self, entry: AllowlistEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admin_allowlist (email, role) VALUES ($1, $2)
             ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(entry.email.to_ascii_lowercase())
        .bind(entry.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_credential(&self, credential: Credential) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO api_keys (id, provider, feature, key_value, priority, status,
                                   failure_count, last_used_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&credential.id)
        .bind(&credential.provider)
        .bind(&credential.feature)
        .bind(&credential.ciphertext)
        .bind(credential.priority)
        .bind(credential.status.as_str())
        .bind(i32::try_from(credential.failure_count).unwrap_or(i32::MAX))
        .bind(credential.last_used_at)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_credential(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Credential::try_from)
            .transpose()
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM api_keys ORDER BY priority DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Credential::try_from)
        .collect()
    }

    async fn delete_credential(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_credential_status(
        &self,
        id: &str,
        status: CredentialStatus,
        priority: Option<i32>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE api_keys
             SET status = $2, priority = COALESCE($3, priority), updated_at = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(priority)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("credential {id}")));
        }
        Ok(())
    }

    async fn active_credentials(
        &self,
        provider: &str,
        feature: &str,
    ) -> Result<Vec<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM api_keys
             WHERE provider = $1 AND feature = $2 AND status = 'active'
             ORDER BY priority DESC, created_at DESC",
        )
        .bind(provider)
        .bind(feature)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Credential::try_from)
        .collect()
    }

    async fn credentials_for_feature(&self, feature: &str) -> Result<Vec<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM api_keys WHERE feature = $1
             ORDER BY priority DESC, created_at DESC",
        )
        .bind(feature)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Credential::try_from)
        .collect()
    }

    async fn providers_with_active(&self, feature: &str) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT provider FROM api_keys
             WHERE feature = $1 AND status = 'active'
             GROUP BY provider
             ORDER BY MAX(priority) DESC",
        )
        .bind(feature)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn increment_failure(&self, id: &str) -> Result<u32, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE api_keys
             SET failure_count = failure_count + 1, updated_at = $2
             WHERE id = $1
             RETURNING failure_count",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        count
            .map(|c| c.max(0).unsigned_abs())
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))
    }

    async fn clear_failures(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE api_keys SET failure_count = 0, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("credential {id}")));
        }
        Ok(())
    }

    async fn touch_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl UsageStore for PgStore {
    async fn get_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<UsageCounter>, StoreError> {
        Ok(sqlx::query_as::<_, UsageRow>(
            "SELECT * FROM usage_counters WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(UsageCounter::from))
    }

    async fn apply_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        tokens: u64,
        feature: &str,
    ) -> Result<(), StoreError> {
        // One statement per apply keeps the increments atomic per request;
        // check-then-increment across requests stays best-effort by design.
        let mut seed = UsageCounter::empty(user_id, date);
        seed.apply(tokens, feature);

        sqlx::query(
            "INSERT INTO usage_counters
                 (user_id, date, tokens_used, requests_count, pdf_uploads,
                  mcqs_generated, images_used, flashcards_generated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, date) DO UPDATE SET
                 tokens_used          = usage_counters.tokens_used + EXCLUDED.tokens_used,
                 requests_count       = usage_counters.requests_count + EXCLUDED.requests_count,
                 pdf_uploads          = usage_counters.pdf_uploads + EXCLUDED.pdf_uploads,
                 mcqs_generated       = usage_counters.mcqs_generated + EXCLUDED.mcqs_generated,
                 images_used          = usage_counters.images_used + EXCLUDED.images_used,
                 flashcards_generated = usage_counters.flashcards_generated + EXCLUDED.flashcards_generated",
        )
        .bind(user_id)
        .bind(date)
        .bind(i64::try_from(seed.tokens_used).unwrap_or(i64::MAX))
        .bind(i64::try_from(seed.requests_count).unwrap_or(i64::MAX))
        .bind(i64::try_from(seed.pdf_uploads).unwrap_or(i64::MAX))
        .bind(i64::try_from(seed.mcqs_generated).unwrap_or(i64::MAX))
        .bind(i64::try_from(seed.images_used).unwrap_or(i64::MAX))
        .bind(i64::try_from(seed.flashcards_generated).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn reset_usage(&self, user_id: &str, date: NaiveDate) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO usage_counters (user_id, date) VALUES ($1, $2)
             ON CONFLICT (user_id, date) DO UPDATE SET
                 tokens_used = 0, requests_count = 0, pdf_uploads = 0,
                 mcqs_generated = 0, images_used = 0, flashcards_generated = 0",
        )
        .bind(user_id)
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl FlagStore for PgStore {
    async fn get_flag(&self, name: &str) -> Result<Option<SystemFlag>, StoreError> {
        Ok(sqlx::query_as::<_, FlagRow>(
            "SELECT * FROM system_flags WHERE flag_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(SystemFlag::from))
    }

    async fn set_flag(
        &self,
        name: &str,
        value: &str,
        updated_by: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO system_flags (flag_name, flag_value, updated_by, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (flag_name) DO UPDATE SET
                 flag_value = EXCLUDED.flag_value,
                 updated_by = EXCLUDED.updated_by,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(name)
        .bind(value)
        .bind(updated_by)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn flags_with_prefix(&self, prefix: &str) -> Result<Vec<SystemFlag>, StoreError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        Ok(sqlx::query_as::<_, FlagRow>(
            "SELECT * FROM system_flags WHERE flag_name LIKE $1",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(SystemFlag::from)
        .collect())
    }
}

#[async_trait]
impl HealthCheckStore for PgStore {
    async fn append_health_check(&self, record: HealthCheckRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO provider_health (id, api_key_id, checked_at, status, latency_ms, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.id)
        .bind(&record.credential_id)
        .bind(record.checked_at)
        .bind(&record.status)
        .bind(record.latency_ms.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .bind(&record.error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn recent_health_checks(
        &self,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        Ok(sqlx::query_as::<_, HealthRow>(
            "SELECT * FROM provider_health ORDER BY checked_at DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(HealthCheckRecord::from)
        .collect())
    }

    async fn health_checks_for(
        &self,
        credential_id: &str,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        Ok(sqlx::query_as::<_, HealthRow>(
            "SELECT * FROM provider_health WHERE api_key_id = $1
             ORDER BY checked_at DESC LIMIT $2",
        )
        .bind(credential_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(HealthCheckRecord::from)
        .collect())
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn insert_session(&self, session: ChatSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM chat_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(ChatSession::from))
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatSession>, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM chat_sessions WHERE user_id = $1
             ORDER BY updated_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(ChatSession::from)
        .collect())
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        let citations = message
            .citations
            .as_ref()
            .map(|c| serde_json::to_value(c))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, tokens_used, citations, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.tokens_used.map(|t| i64::try_from(t).unwrap_or(i64::MAX)))
        .bind(citations)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE chat_sessions SET updated_at = $2 WHERE id = $1")
            .bind(&message.session_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE session_id = $1 ORDER BY created_at",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Message::try_from)
        .collect()
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert_document(&self, document: Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, user_id, filename, file_type, size_bytes,
                                    storage_path, processing_status, processing_error, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&document.id)
        .bind(&document.user_id)
        .bind(&document.filename)
        .bind(document.file_type.as_str())
        .bind(i64::try_from(document.size_bytes).unwrap_or(i64::MAX))
        .bind(&document.storage_path)
        .bind(document.processing_status.as_str())
        .bind(&document.processing_error)
        .bind(document.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Document::try_from)
            .transpose()
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Document::try_from)
        .collect()
    }

    async fn set_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET processing_status = $2, processing_error = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        // Embeddings cascade via the foreign key.
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn completed_document_ids(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM documents
             WHERE user_id = $1 AND processing_status = 'completed'
               AND ($2::TEXT IS NULL OR id = $2)",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_embeddings(&self, rows: Vec<EmbeddingRow>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO embeddings (id, document_id, chunk_text, chunk_index, embedding)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&row.id)
            .bind(&row.document_id)
            .bind(&row.chunk_text)
            .bind(row.chunk_index)
            .bind(&row.vector)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn embeddings_for_documents(
        &self,
        document_ids: &[String],
        include_summary: bool,
    ) -> Result<Vec<EmbeddingRow>, StoreError> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = if include_summary {
            "SELECT * FROM embeddings WHERE document_id = ANY($1)"
        } else {
            "SELECT * FROM embeddings WHERE document_id = ANY($1) AND chunk_index <> -1"
        };
        Ok(sqlx::query_as::<_, EmbeddingDbRow>(sql)
            .bind(document_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(EmbeddingRow::from)
            .collect())
    }
}
