use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::UnknownVariant;

/// Fixed dimensionality of stored embedding vectors.
pub const EMBEDDING_DIM: usize = 768;

/// Sentinel `chunk_index` marking a whole-document summary or image
/// interpretation. Sentinel chunks are excluded from semantic search.
pub const SUMMARY_CHUNK_INDEX: i32 = -1;

/// Kind of uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Image,
}

impl FileType {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(Self::Pdf),
            "image" => Ok(Self::Image),
            other => Err(UnknownVariant {
                kind: "file type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Ingestion state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant {
                kind: "processing status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A user-uploaded document. Owns its [`EmbeddingRow`]s (cascade delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub size_bytes: u64,
    /// Location in the blob store.
    pub storage_path: String,
    pub processing_status: ProcessingStatus,
    /// Error text when `processing_status` is `failed`.
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One embedded chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRow {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub document_id: String,
    pub chunk_text: String,
    /// Non-negative for content chunks; [`SUMMARY_CHUNK_INDEX`] for the
    /// whole-document summary or image interpretation.
    pub chunk_index: i32,
    /// The embedding vector ([`EMBEDDING_DIM`] components).
    pub vector: Vec<f32>,
}

impl EmbeddingRow {
    /// Whether this row is the summary/interpretation sentinel.
    #[must_use]
    pub fn is_summary(&self) -> bool {
        self.chunk_index == SUMMARY_CHUNK_INDEX
    }
}

/// A semantic search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_text: String,
    pub chunk_index: i32,
    pub document_id: String,
    pub document_filename: String,
    pub similarity_score: f32,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn file_type_roundtrip() {
        assert_eq!(FileType::from_str("pdf").unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_str("image").unwrap(), FileType::Image);
        assert!(FileType::from_str("docx").is_err());
    }

    #[test]
    fn processing_status_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn summary_sentinel() {
        let row = EmbeddingRow {
            id: "e1".into(),
            document_id: "d1".into(),
            chunk_text: "High-Yield Summary".into(),
            chunk_index: SUMMARY_CHUNK_INDEX,
            vector: vec![0.0; 4],
        };
        assert!(row.is_summary());
    }
}
