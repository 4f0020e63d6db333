//! In-memory backend implementing every storage trait.
//!
//! Backed by concurrent maps; suitable for development and tests. Ordering
//! guarantees match the relational backend: credentials sort by
//! `(priority DESC, created_at DESC)`, listings sort newest first.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::{
    AllowlistEntry, ChatSession, Credential, CredentialStatus, Document, EmbeddingRow, Message,
    Plan, ProcessingStatus, Role, SystemFlag, UsageCounter, User,
};

use crate::chat::ChatStore;
use crate::credentials::CredentialStore;
use crate::documents::DocumentStore;
use crate::error::StoreError;
use crate::flags::FlagStore;
use crate::health::HealthCheckStore;
use crate::usage::UsageStore;
use crate::users::UserStore;

/// In-memory store implementing all storage traits.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    allowlist: DashMap<String, Role>,
    credentials: DashMap<String, Credential>,
    usage: DashMap<(String, NaiveDate), UsageCounter>,
    flags: DashMap<String, SystemFlag>,
    health: Mutex<Vec<HealthCheckRecord>>,
    sessions: DashMap<String, ChatSession>,
    messages: DashMap<String, Vec<Message>>,
    documents: DashMap<String, Document>,
    embeddings: DashMap<String, Vec<EmbeddingRow>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_credentials(mut rows: Vec<Credential>) -> Vec<Credential> {
        rows.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        rows
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let duplicate = self
            .users
            .iter()
            .any(|entry| entry.value().email.eq_ignore_ascii_case(&user.email));
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone()))
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn set_plan(&self, id: &str, plan: Plan) -> Result<(), StoreError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.plan = plan;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_disabled(&self, id: &str, disabled: bool) -> Result<(), StoreError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.disabled = disabled;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_personal_key(
        &self,
        id: &str,
        ciphertext: Option<String>,
    ) -> Result<(), StoreError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.personal_api_key = ciphertext;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn allowlist_role(&self, email: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.allowlist.get(&email.to_ascii_lowercase()).map(|r| *r))
    }

    async fn upsert_allowlist(&self, entry: AllowlistEntry) -> Result<(), StoreError> {
        self.allowlist
            .insert(entry.email.to_ascii_lowercase(), entry.role);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(&self, credential: Credential) -> Result<(), StoreError> {
        self.credentials.insert(credential.id.clone(), credential);
        Ok(())
    }

    async fn get_credential(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.get(id).map(|c| c.value().clone()))
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        Ok(Self::sorted_credentials(
            self.credentials.iter().map(|e| e.value().clone()).collect(),
        ))
    }

    async fn delete_credential(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.credentials.remove(id).is_some())
    }

    async fn set_credential_status(
        &self,
        id: &str,
        status: CredentialStatus,
        priority: Option<i32>,
    ) -> Result<(), StoreError> {
        let mut cred = self
            .credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))?;
        cred.status = status;
        if let Some(priority) = priority {
            cred.priority = priority;
        }
        cred.updated_at = Utc::now();
        Ok(())
    }

    async fn active_credentials(
        &self,
        provider: &str,
        feature: &str,
    ) -> Result<Vec<Credential>, StoreError> {
        Ok(Self::sorted_credentials(
            self.credentials
                .iter()
                .filter(|e| {
                    let c = e.value();
                    c.provider == provider
                        && c.feature == feature
                        && c.status == CredentialStatus::Active
                })
                .map(|e| e.value().clone())
                .collect(),
        ))
    }

    async fn credentials_for_feature(&self, feature: &str) -> Result<Vec<Credential>, StoreError> {
        Ok(Self::sorted_credentials(
            self.credentials
                .iter()
                .filter(|e| e.value().feature == feature)
                .map(|e| e.value().clone())
                .collect(),
        ))
    }

    async fn providers_with_active(&self, feature: &str) -> Result<Vec<String>, StoreError> {
        let sorted = Self::sorted_credentials(
            self.credentials
                .iter()
                .filter(|e| {
                    let c = e.value();
                    c.feature == feature && c.status == CredentialStatus::Active
                })
                .map(|e| e.value().clone())
                .collect(),
        );
        let mut providers = Vec::new();
        for cred in sorted {
            if !providers.contains(&cred.provider) {
                providers.push(cred.provider);
            }
        }
        Ok(providers)
    }

    async fn increment_failure(&self, id: &str) -> Result<u32, StoreError> {
        let mut cred = self
            .credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))?;
        cred.failure_count += 1;
        cred.updated_at = Utc::now();
        Ok(cred.failure_count)
    }

    async fn clear_failures(&self, id: &str) -> Result<(), StoreError> {
        let mut cred = self
            .credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))?;
        cred.failure_count = 0;
        cred.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut cred = self
            .credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))?;
        cred.last_used_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn get_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<UsageCounter>, StoreError> {
        Ok(self
            .usage
            .get(&(user_id.to_owned(), date))
            .map(|c| c.value().clone()))
    }

    async fn apply_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        tokens: u64,
        feature: &str,
    ) -> Result<(), StoreError> {
        self.usage
            .entry((user_id.to_owned(), date))
            .or_insert_with(|| UsageCounter::empty(user_id, date))
            .apply(tokens, feature);
        Ok(())
    }

    async fn reset_usage(&self, user_id: &str, date: NaiveDate) -> Result<(), StoreError> {
        self.usage
            .insert((user_id.to_owned(), date), UsageCounter::empty(user_id, date));
        Ok(())
    }
}

#[async_trait]
impl FlagStore for MemoryStore {
    async fn get_flag(&self, name: &str) -> Result<Option<SystemFlag>, StoreError> {
        Ok(self.flags.get(name).map(|f| f.value().clone()))
    }

    async fn set_flag(
        &self,
        name: &str,
        value: &str,
        updated_by: Option<&str>,
    ) -> Result<(), StoreError> {
        self.flags.insert(
            name.to_owned(),
            SystemFlag {
                name: name.to_owned(),
                value: value.to_owned(),
                updated_by: updated_by.map(str::to_owned),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn flags_with_prefix(&self, prefix: &str) -> Result<Vec<SystemFlag>, StoreError> {
        Ok(self
            .flags
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.value().clone())
            .collect())
    }
}

#[async_trait]
impl HealthCheckStore for MemoryStore {
    async fn append_health_check(&self, record: HealthCheckRecord) -> Result<(), StoreError> {
        let mut records = self
            .health
            .lock()
            .map_err(|_| StoreError::Backend("health log poisoned".to_owned()))?;
        records.push(record);
        Ok(())
    }

    async fn recent_health_checks(
        &self,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        let records = self
            .health
            .lock()
            .map_err(|_| StoreError::Backend("health log poisoned".to_owned()))?;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn health_checks_for(
        &self,
        credential_id: &str,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        let records = self
            .health
            .lock()
            .map_err(|_| StoreError::Backend("health log poisoned".to_owned()))?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.credential_id == credential_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_session(&self, session: ChatSession) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatSession>, StoreError> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        let session_id = message.session_id.clone();
        {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
            session.updated_at = Utc::now();
        }
        self.messages.entry(session_id).or_default().push(message);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .get(session_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        self.messages.remove(id);
        Ok(self.sessions.remove(id).is_some())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, document: Document) -> Result<(), StoreError> {
        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.get(id).map(|d| d.value().clone()))
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn set_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut doc = self
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        doc.processing_status = status;
        doc.processing_error = error;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        self.embeddings.remove(id);
        Ok(self.documents.remove(id).is_some())
    }

    async fn completed_document_ids(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .documents
            .iter()
            .filter(|e| {
                let d = e.value();
                d.user_id == user_id
                    && d.processing_status == ProcessingStatus::Completed
                    && document_id.is_none_or(|id| d.id == id)
            })
            .map(|e| e.key().clone())
            .collect())
    }

    async fn insert_embeddings(&self, rows: Vec<EmbeddingRow>) -> Result<(), StoreError> {
        for row in rows {
            self.embeddings
                .entry(row.document_id.clone())
                .or_default()
                .push(row);
        }
        Ok(())
    }

    async fn embeddings_for_documents(
        &self,
        document_ids: &[String],
        include_summary: bool,
    ) -> Result<Vec<EmbeddingRow>, StoreError> {
        let mut out = Vec::new();
        for id in document_ids {
            if let Some(rows) = self.embeddings.get(id) {
                out.extend(
                    rows.iter()
                        .filter(|r| include_summary || !r.is_summary())
                        .cloned(),
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use vaidya_core::{FileType, SUMMARY_CHUNK_INDEX};

    use super::*;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.into(),
            email: email.into(),
            display_name: "Test".into(),
            plan: Plan::Free,
            role: None,
            disabled: false,
            personal_api_key: None,
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn credential(id: &str, provider: &str, feature: &str, priority: i32) -> Credential {
        Credential {
            id: id.into(),
            provider: provider.into(),
            feature: feature.into(),
            ciphertext: "ENC[AES256-GCM,data:a,iv:b,tag:c]".into(),
            priority,
            status: CredentialStatus::Active,
            failure_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(user("u1", "a@b.c")).await.unwrap();
        let err = store.insert_user(user("u2", "A@B.C")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn active_credentials_ordered_by_priority() {
        let store = MemoryStore::new();
        store
            .insert_credential(credential("low", "openrouter", "chat", 5))
            .await
            .unwrap();
        store
            .insert_credential(credential("high", "openrouter", "chat", 10))
            .await
            .unwrap();

        let active = store.active_credentials("openrouter", "chat").await.unwrap();
        let ids: Vec<&str> = active.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn degraded_excluded_from_active() {
        let store = MemoryStore::new();
        let mut degraded = credential("d", "openrouter", "chat", 10);
        degraded.status = CredentialStatus::Degraded;
        store.insert_credential(degraded).await.unwrap();
        store
            .insert_credential(credential("a", "openrouter", "chat", 1))
            .await
            .unwrap();

        let active = store.active_credentials("openrouter", "chat").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");

        // Still visible to maintenance evaluation.
        let all = store.credentials_for_feature("chat").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn providers_with_active_deduplicates() {
        let store = MemoryStore::new();
        store
            .insert_credential(credential("k1", "anthropic", "chat", 20))
            .await
            .unwrap();
        store
            .insert_credential(credential("k2", "anthropic", "chat", 15))
            .await
            .unwrap();
        store
            .insert_credential(credential("k3", "openrouter", "chat", 10))
            .await
            .unwrap();

        let providers = store.providers_with_active("chat").await.unwrap();
        assert_eq!(providers, vec!["anthropic".to_owned(), "openrouter".to_owned()]);
    }

    #[tokio::test]
    async fn apply_usage_upserts() {
        let store = MemoryStore::new();
        let today = Utc::now().date_naive();
        store.apply_usage("u1", today, 100, "chat").await.unwrap();
        store.apply_usage("u1", today, 50, "mcq").await.unwrap();

        let usage = store.get_usage("u1", today).await.unwrap().unwrap();
        assert_eq!(usage.tokens_used, 150);
        assert_eq!(usage.requests_count, 2);
        assert_eq!(usage.mcqs_generated, 1);
    }

    #[tokio::test]
    async fn reset_usage_zeroes() {
        let store = MemoryStore::new();
        let today = Utc::now().date_naive();
        store.apply_usage("u1", today, 999, "chat").await.unwrap();
        store.reset_usage("u1", today).await.unwrap();
        let usage = store.get_usage("u1", today).await.unwrap().unwrap();
        assert_eq!(usage.tokens_used, 0);
    }

    #[tokio::test]
    async fn flags_with_prefix_filters() {
        let store = MemoryStore::new();
        store.set_flag("feature_mcq_enabled", "false", None).await.unwrap();
        store.set_flag("maintenance_mode", "{}", None).await.unwrap();

        let flags = store.flags_with_prefix("feature_").await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].name, "feature_mcq_enabled");
    }

    #[tokio::test]
    async fn delete_document_cascades_embeddings() {
        let store = MemoryStore::new();
        store
            .insert_document(Document {
                id: "d1".into(),
                user_id: "u1".into(),
                filename: "a.pdf".into(),
                file_type: FileType::Pdf,
                size_bytes: 10,
                storage_path: "docs/u1/d1".into(),
                processing_status: ProcessingStatus::Completed,
                processing_error: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_embeddings(vec![EmbeddingRow {
                id: "e1".into(),
                document_id: "d1".into(),
                chunk_text: "text".into(),
                chunk_index: 0,
                vector: vec![0.0; 4],
            }])
            .await
            .unwrap();

        assert!(store.delete_document("d1").await.unwrap());
        let rows = store
            .embeddings_for_documents(&["d1".to_owned()], true)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn summary_rows_excluded_by_default() {
        let store = MemoryStore::new();
        store
            .insert_embeddings(vec![
                EmbeddingRow {
                    id: "e1".into(),
                    document_id: "d1".into(),
                    chunk_text: "content".into(),
                    chunk_index: 0,
                    vector: vec![0.0; 4],
                },
                EmbeddingRow {
                    id: "e2".into(),
                    document_id: "d1".into(),
                    chunk_text: "summary".into(),
                    chunk_index: SUMMARY_CHUNK_INDEX,
                    vector: vec![0.0; 4],
                },
            ])
            .await
            .unwrap();

        let rows = store
            .embeddings_for_documents(&["d1".to_owned()], false)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].chunk_index, 0);
    }
}
