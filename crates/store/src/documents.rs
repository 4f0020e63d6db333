use async_trait::async_trait;

use vaidya_core::{Document, EmbeddingRow, ProcessingStatus};

use crate::error::StoreError;

/// Storage for documents and their embedded chunks.
///
/// A document owns its embeddings: deleting the document removes them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document row.
    async fn insert_document(&self, document: Document) -> Result<(), StoreError>;

    /// Fetch a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents owned by a user, most recent first.
    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError>;

    /// Update processing status (and error text for failures).
    async fn set_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Delete a document and its embeddings. Returns `true` if it existed.
    async fn delete_document(&self, id: &str) -> Result<bool, StoreError>;

    /// Ids of a user's completed documents, optionally narrowed to one id.
    async fn completed_document_ids(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<String>, StoreError>;

    /// Batch-insert embedding rows.
    async fn insert_embeddings(&self, rows: Vec<EmbeddingRow>) -> Result<(), StoreError>;

    /// All embeddings for the given documents. When `include_summary` is
    /// false, sentinel rows (`chunk_index = -1`) are excluded.
    async fn embeddings_for_documents(
        &self,
        document_ids: &[String],
        include_summary: bool,
    ) -> Result<Vec<EmbeddingRow>, StoreError>;
}
