use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use vaidya_core::{
    features, Citation, Document, EmbeddingRow, FileType, ProcessingStatus, SearchHit,
    SUMMARY_CHUNK_INDEX,
};
use vaidya_embedding::{cosine_similarity, EmbeddingProvider};
use vaidya_provider::CompletionRequest;
use vaidya_store::{BlobStore, DocumentStore};

use crate::error::GatewayError;
use crate::router::ModelRouter;

/// Characters per content chunk.
const CHUNK_SIZE: usize = 500;

/// Overlapping characters between consecutive chunks.
const CHUNK_OVERLAP: usize = 100;

/// Leading characters of a document fed to the summary prompt.
const SUMMARY_INPUT_LIMIT: usize = 6000;

/// Fixed prompt for medical image interpretation.
const IMAGE_INTERPRETATION_PROMPT: &str = "You are a medical imaging tutor. Describe this \
    image for a medical student: the modality, the anatomy shown, any visible abnormality \
    or pathology, and the key teaching points.";

/// Split text into overlapping character windows.
///
/// Windows are [`CHUNK_SIZE`] characters with [`CHUNK_OVERLAP`] characters of
/// overlap; whitespace-only windows are dropped and indices stay dense.
#[must_use]
pub fn chunk_text(text: &str) -> Vec<(String, i32)> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i32;

    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push((trimmed.to_owned(), index));
            index += 1;
        }
        if end == chars.len() {
            break;
        }
        start = end - CHUNK_OVERLAP;
    }
    chunks
}

/// Ingests uploaded documents and serves semantic retrieval over them.
///
/// Ingestion runs as queued background work bounded by a semaphore so a
/// burst of uploads cannot exhaust the process.
#[derive(Clone)]
pub struct DocumentPipeline {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    router: Arc<ModelRouter>,
    ingest_slots: Arc<tokio::sync::Semaphore>,
}

impl DocumentPipeline {
    /// Build the pipeline with the given number of concurrent ingest slots.
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        router: Arc<ModelRouter>,
        max_concurrent_ingests: usize,
    ) -> Self {
        Self {
            documents,
            blobs,
            embedder,
            router,
            ingest_slots: Arc::new(tokio::sync::Semaphore::new(max_concurrent_ingests.max(1))),
        }
    }

    /// Store the blob and create the pending document row.
    #[instrument(skip(self, data))]
    pub async fn upload(
        &self,
        user_id: &str,
        filename: &str,
        file_type: FileType,
        data: Bytes,
    ) -> Result<Document, GatewayError> {
        if data.is_empty() {
            return Err(GatewayError::InvalidInput("empty upload".to_owned()));
        }

        let id = Uuid::new_v4().to_string();
        let storage_path = format!("documents/{user_id}/{id}");
        self.blobs.put_blob(&storage_path, data.clone()).await?;

        let document = Document {
            id,
            user_id: user_id.to_owned(),
            filename: filename.to_owned(),
            file_type,
            size_bytes: data.len() as u64,
            storage_path,
            processing_status: ProcessingStatus::Pending,
            processing_error: None,
            created_at: Utc::now(),
        };
        self.documents.insert_document(document.clone()).await?;
        info!(id = %document.id, filename, "document uploaded");
        Ok(document)
    }

    /// Queue background processing for a document. The task takes an ingest
    /// slot before doing work; failures end up on the document row.
    pub fn spawn_processing(&self, document_id: String) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _permit = match pipeline.ingest_slots.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if let Err(e) = pipeline.process(&document_id).await {
                error!(document_id, error = %e, "document processing failed");
            }
        });
    }

    /// Process a document according to its type, settling its status.
    #[instrument(skip(self))]
    pub async fn process(&self, document_id: &str) -> Result<(), GatewayError> {
        let document = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("document {document_id}")))?;

        self.documents
            .set_document_status(document_id, ProcessingStatus::Processing, None)
            .await?;

        let result = match document.file_type {
            FileType::Pdf => self.process_pdf(&document).await,
            FileType::Image => self.process_image(&document).await,
        };

        match result {
            Ok(()) => {
                self.documents
                    .set_document_status(document_id, ProcessingStatus::Completed, None)
                    .await?;
                info!(document_id, "document processing completed");
                Ok(())
            }
            Err(e) => {
                // Chunks inserted before the failure stay; the user's delete
                // cleans them up.
                let message = e.to_string();
                self.documents
                    .set_document_status(
                        document_id,
                        ProcessingStatus::Failed,
                        Some(message.clone()),
                    )
                    .await?;
                Err(GatewayError::Ingestion(message))
            }
        }
    }

    /// PDF ingestion: extract, chunk, embed, store, then summarize.
    async fn process_pdf(&self, document: &Document) -> Result<(), GatewayError> {
        let data = self.blobs.get_blob(&document.storage_path).await?;

        let text = pdf_extract::extract_text_from_mem(&data)
            .map_err(|e| GatewayError::Ingestion(format!("PDF text extraction failed: {e}")))?;
        if text.trim().is_empty() {
            return Err(GatewayError::Ingestion(
                "no text could be extracted from PDF".to_owned(),
            ));
        }

        let chunks = chunk_text(&text);
        let mut rows = Vec::with_capacity(chunks.len());
        for (chunk, index) in &chunks {
            let vector = self
                .embedder
                .embed(chunk)
                .await
                .map_err(|e| GatewayError::Ingestion(format!("embedding failed: {e}")))?;
            rows.push(EmbeddingRow {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                chunk_text: chunk.clone(),
                chunk_index: *index,
                vector,
            });
        }
        let chunk_count = rows.len();
        self.documents.insert_embeddings(rows).await?;
        info!(document_id = %document.id, chunk_count, "content chunks embedded");

        // A failed summary leaves the content chunks usable; the document
        // still completes.
        if let Err(e) = self.store_summary(document, &text).await {
            warn!(document_id = %document.id, error = %e, "summary generation failed");
        }
        Ok(())
    }

    /// Generate the high-yield summary and store it as the sentinel chunk.
    async fn store_summary(&self, document: &Document, text: &str) -> Result<(), GatewayError> {
        let lead: String = text.chars().take(SUMMARY_INPUT_LIMIT).collect();
        let prompt = format!(
            "Generate a high-yield clinical summary of this medical document.\n\
             Include:\n\
             1. Document type and context\n\
             2. Key clinical findings and data points\n\
             3. Relevant pathophysiology or management mentioned\n\
             4. Recommended study focus areas\n\n\
             Text: {lead}"
        );

        let outcome = self
            .router
            .route(
                Some(&document.user_id),
                CompletionRequest::new(features::EXPLAIN, prompt),
            )
            .await?;

        let summary = format!(
            "High-Yield Summary of {}:\n{}",
            document.filename, outcome.content
        );
        let vector = self
            .embedder
            .embed(&summary)
            .await
            .map_err(|e| GatewayError::Ingestion(format!("summary embedding failed: {e}")))?;

        self.documents
            .insert_embeddings(vec![EmbeddingRow {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                chunk_text: summary,
                chunk_index: SUMMARY_CHUNK_INDEX,
                vector,
            }])
            .await?;
        Ok(())
    }

    /// Image ingestion: interpret through the router, embed the
    /// interpretation as a single sentinel chunk.
    async fn process_image(&self, document: &Document) -> Result<(), GatewayError> {
        let data = self.blobs.get_blob(&document.storage_path).await?;

        let outcome = self
            .router
            .route(
                Some(&document.user_id),
                CompletionRequest::new(features::IMAGE, IMAGE_INTERPRETATION_PROMPT)
                    .with_image(data.to_vec()),
            )
            .await?;

        let interpretation = format!(
            "Interpretation of {}:\n{}",
            document.filename, outcome.content
        );
        let vector = self
            .embedder
            .embed(&interpretation)
            .await
            .map_err(|e| GatewayError::Ingestion(format!("embedding failed: {e}")))?;

        self.documents
            .insert_embeddings(vec![EmbeddingRow {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                chunk_text: interpretation,
                chunk_index: SUMMARY_CHUNK_INDEX,
                vector,
            }])
            .await?;
        Ok(())
    }

    /// Semantic search across a user's completed documents.
    ///
    /// Sentinel chunks are excluded. Vectors that fail to decode or whose
    /// dimensionality does not match the query are skipped with a log line.
    #[instrument(skip(self, query))]
    pub async fn semantic_search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, GatewayError> {
        let document_ids = self
            .documents
            .completed_document_ids(user_id, document_id)
            .await?;
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| GatewayError::Ingestion(format!("query embedding failed: {e}")))?;

        let rows = self
            .documents
            .embeddings_for_documents(&document_ids, false)
            .await?;

        let filenames: std::collections::HashMap<String, String> = {
            let mut map = std::collections::HashMap::new();
            for doc in self.documents.list_documents(user_id).await? {
                map.insert(doc.id, doc.filename);
            }
            map
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for row in rows {
            if row.vector.len() != query_vector.len() {
                warn!(
                    embedding_id = %row.id,
                    expected = query_vector.len(),
                    actual = row.vector.len(),
                    "skipping embedding with mismatched dimensionality"
                );
                continue;
            }
            let similarity = cosine_similarity(&query_vector, &row.vector);
            hits.push(SearchHit {
                chunk_text: row.chunk_text,
                chunk_index: row.chunk_index,
                document_id: row.document_id.clone(),
                document_filename: filenames
                    .get(&row.document_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_owned()),
                similarity_score: similarity,
            });
        }

        hits.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Retrieval context for a chat prompt: the top 3 chunks formatted as
    /// numbered sources, plus the citations to store on the reply.
    pub async fn rag_context(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Option<(String, Vec<Citation>)>, GatewayError> {
        let hits = self.semantic_search(user_id, query, 3, None).await?;
        if hits.is_empty() {
            return Ok(None);
        }

        let mut block = String::from("Relevant excerpts from your documents:\n");
        let mut citations = Vec::with_capacity(hits.len());
        for (i, hit) in hits.iter().enumerate() {
            block.push_str(&format!(
                "[Source {}] {} (chunk {}):\n{}\n\n",
                i + 1,
                hit.document_filename,
                hit.chunk_index,
                hit.chunk_text
            ));
            citations.push(Citation {
                document_id: hit.document_id.clone(),
                document_filename: hit.document_filename.clone(),
                chunk_index: hit.chunk_index,
                similarity_score: hit.similarity_score,
            });
        }
        Ok(Some((block, citations)))
    }

    /// A user's documents, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Document>, GatewayError> {
        Ok(self.documents.list_documents(user_id).await?)
    }

    /// Delete a document the user owns, along with its embeddings and blob.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, document_id: &str) -> Result<(), GatewayError> {
        let document = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("document {document_id}")))?;
        if document.user_id != user_id {
            return Err(GatewayError::NotFound(format!("document {document_id}")));
        }

        if let Err(e) = self.blobs.delete_blob(&document.storage_path).await {
            warn!(document_id, error = %e, "blob deletion failed; continuing");
        }
        self.documents.delete_document(document_id).await?;
        info!(document_id, "document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_respects_size_and_overlap() {
        let text = "a".repeat(1200);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].0.len(), 500);
        assert_eq!(chunks[0].1, 0);
        assert_eq!(chunks[1].1, 1);
        // Second window starts at 400, so the first 100 chars repeat.
        assert_eq!(chunks[1].0.len(), 500);
        assert_eq!(chunks[2].0.len(), 400);
    }

    #[test]
    fn chunking_short_text_is_single_chunk() {
        let chunks = chunk_text("short document");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], ("short document".to_owned(), 0));
    }

    #[test]
    fn chunking_skips_whitespace_windows() {
        // The second window (chars 400..590) is all whitespace and is
        // dropped without consuming an index.
        let text = format!("{}{}", "x".repeat(400), " ".repeat(190));
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].1, 0);
    }

    #[test]
    fn chunking_empty_text() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n  ").is_empty());
    }
}
