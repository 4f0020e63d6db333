//! Text embedding for document ingestion and semantic retrieval.

pub mod config;
pub mod cosine;
pub mod error;
pub mod http;
pub mod mock;
pub mod provider;

pub use config::EmbeddingConfig;
pub use cosine::cosine_similarity;
pub use error::EmbeddingError;
pub use http::HttpEmbeddingProvider;
pub use mock::{FailingEmbeddingProvider, MappingEmbeddingProvider, MockEmbeddingProvider};
pub use provider::EmbeddingProvider;
