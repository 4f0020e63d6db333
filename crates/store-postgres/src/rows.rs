//! Row types mapping table shapes onto the domain structs.
//!
//! Enum columns are stored as text and parsed on read; unknown values
//! surface as [`StoreError::Serialization`] rather than panicking at a read
//! site.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::{
    ChatSession, Citation, Credential, CredentialStatus, Document, EmbeddingRow, FileType,
    Message, MessageRole, Plan, ProcessingStatus, Role, SystemFlag, UsageCounter, User,
};
use vaidya_store::StoreError;

fn parse<T: FromStr>(value: &str, what: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Serialization(format!("{what}: {e}")))
}

#[allow(clippy::cast_sign_loss)]
fn as_u64(value: i64) -> u64 {
    value.max(0) as u64
}

#[derive(FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub plan: String,
    pub role: Option<String>,
    pub disabled: bool,
    pub personal_api_key: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            plan: parse::<Plan>(&row.plan, "plan")?,
            role: row
                .role
                .as_deref()
                .map(|r| parse::<Role>(r, "role"))
                .transpose()?,
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            disabled: row.disabled,
            personal_api_key: row.personal_api_key,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub struct CredentialRow {
    pub id: String,
    pub provider: String,
    pub feature: String,
    pub key_value: String,
    pub priority: i32,
    pub status: String,
    pub failure_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = StoreError;

    fn try_from(row: CredentialRow) -> Result<Self, StoreError> {
        Ok(Credential {
            status: parse::<CredentialStatus>(&row.status, "credential status")?,
            id: row.id,
            provider: row.provider,
            feature: row.feature,
            ciphertext: row.key_value,
            priority: row.priority,
            failure_count: row.failure_count.max(0).unsigned_abs(),
            last_used_at: row.last_used_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub struct UsageRow {
    pub user_id: String,
    pub date: NaiveDate,
    pub tokens_used: i64,
    pub requests_count: i64,
    pub pdf_uploads: i64,
    pub mcqs_generated: i64,
    pub images_used: i64,
    pub flashcards_generated: i64,
}

impl From<UsageRow> for UsageCounter {
    fn from(row: UsageRow) -> Self {
        UsageCounter {
            user_id: row.user_id,
            date: row.date,
            tokens_used: as_u64(row.tokens_used),
            requests_count: as_u64(row.requests_count),
            pdf_uploads: as_u64(row.pdf_uploads),
            mcqs_generated: as_u64(row.mcqs_generated),
            images_used: as_u64(row.images_used),
            flashcards_generated: as_u64(row.flashcards_generated),
        }
    }
}

#[derive(FromRow)]
pub struct FlagRow {
    pub flag_name: String,
    pub flag_value: String,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<FlagRow> for SystemFlag {
    fn from(row: FlagRow) -> Self {
        SystemFlag {
            name: row.flag_name,
            value: row.flag_value,
            updated_by: row.updated_by,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
pub struct HealthRow {
    pub id: String,
    pub api_key_id: String,
    pub checked_at: DateTime<Utc>,
    pub status: String,
    pub latency_ms: Option<i64>,
    pub error_message: Option<String>,
}

impl From<HealthRow> for HealthCheckRecord {
    fn from(row: HealthRow) -> Self {
        HealthCheckRecord {
            id: row.id,
            credential_id: row.api_key_id,
            checked_at: row.checked_at,
            status: row.status,
            latency_ms: row.latency_ms.map(as_u64),
            error: row.error_message,
        }
    }
}

#[derive(FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SessionRow> for ChatSession {
    fn from(row: SessionRow) -> Self {
        ChatSession {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub tokens_used: Option<i64>,
    pub citations: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, StoreError> {
        let citations = row
            .citations
            .map(|value| {
                serde_json::from_value::<Vec<Citation>>(value)
                    .map_err(|e| StoreError::Serialization(format!("citations: {e}")))
            })
            .transpose()?;
        Ok(Message {
            role: parse::<MessageRole>(&row.role, "message role")?,
            id: row.id,
            session_id: row.session_id,
            content: row.content,
            tokens_used: row.tokens_used.map(as_u64),
            citations,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub processing_status: String,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, StoreError> {
        Ok(Document {
            file_type: parse::<FileType>(&row.file_type, "file type")?,
            processing_status: parse::<ProcessingStatus>(
                &row.processing_status,
                "processing status",
            )?,
            id: row.id,
            user_id: row.user_id,
            filename: row.filename,
            size_bytes: as_u64(row.size_bytes),
            storage_path: row.storage_path,
            processing_error: row.processing_error,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
pub struct EmbeddingDbRow {
    pub id: String,
    pub document_id: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub embedding: Vec<f32>,
}

impl From<EmbeddingDbRow> for EmbeddingRow {
    fn from(row: EmbeddingDbRow) -> Self {
        EmbeddingRow {
            id: row.id,
            document_id: row.document_id,
            chunk_text: row.chunk_text,
            chunk_index: row.chunk_index,
            vector: row.embedding,
        }
    }
}
