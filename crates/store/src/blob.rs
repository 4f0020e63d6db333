use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// A storage backend error occurred.
    #[error("blob storage error: {0}")]
    Storage(String),
}

/// Pluggable blob storage backend for uploaded document bytes.
///
/// Implementors provide the actual storage mechanism (e.g. S3-compatible
/// object storage, filesystem). The core ships an in-memory implementation
/// for development and tests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob at the given path, overwriting any previous content.
    async fn put_blob(&self, path: &str, data: Bytes) -> Result<(), BlobError>;

    /// Retrieve a blob by path.
    async fn get_blob(&self, path: &str) -> Result<Bytes, BlobError>;

    /// Delete a blob by path. Returns `true` if the blob existed.
    async fn delete_blob(&self, path: &str) -> Result<bool, BlobError>;
}

/// In-memory blob store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    /// Create a new empty in-memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_blob(&self, path: &str, data: Bytes) -> Result<(), BlobError> {
        self.blobs.insert(path.to_owned(), data);
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::NotFound(path.to_owned()))
    }

    async fn delete_blob(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryBlobStore::new();
        store
            .put_blob("docs/u1/a.pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        let data = store.get_blob("docs/u1/a.pdf").await.unwrap();
        assert_eq!(&data[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.get_blob("nope").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryBlobStore::new();
        store.put_blob("x", Bytes::from_static(b"1")).await.unwrap();
        assert!(store.delete_blob("x").await.unwrap());
        assert!(!store.delete_blob("x").await.unwrap());
    }
}
