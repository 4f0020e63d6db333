//! Uniform provider adapter for LLM completions.
//!
//! One call shape regardless of vendor: the [`ProviderAdapter`] trait takes
//! a credential and a [`CompletionRequest`] and returns a [`Completion`] or
//! a typed [`CompletionError`], never a panic. The [`ModelCatalog`] maps
//! feature tags to concrete model ids from a static JSON file loaded at
//! startup.

pub mod adapter;
pub mod catalog;
pub mod error;
pub mod huggingface;
pub mod mock;
pub mod openrouter;
pub mod types;

pub use adapter::{CompletionStream, ProviderAdapter};
pub use catalog::{ModelCatalog, DEFAULT_MODEL};
pub use error::{is_token_limit_error, CompletionError};
pub use huggingface::HuggingFaceClient;
pub use mock::{MockAdapter, MockCall};
pub use openrouter::{OpenRouterAdapter, DEFAULT_TIMEOUT};
pub use types::{estimate_tokens, Completion, CompletionRequest, StreamChunk};
