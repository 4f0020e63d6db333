use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::CompletionError;
use crate::types::{Completion, CompletionRequest, StreamChunk};

/// A stream of completion chunks.
pub type CompletionStream = BoxStream<'static, StreamChunk>;

/// Uniform call surface over heterogeneous LLM vendors.
///
/// Adapters are stateless between calls: each invocation carries the
/// credential to use, and nothing is cached. Errors are returned as values
/// (see [`CompletionError`]); an adapter must not panic on vendor behavior.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Execute a completion request with the given API key.
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, CompletionError>;

    /// Execute a streaming completion request.
    ///
    /// The default implementation degrades to [`complete`](Self::complete)
    /// and yields the whole response as a single delta.
    async fn stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let completion = self.complete(api_key, request).await?;
        let chunks = vec![
            StreamChunk::Delta(completion.content),
            StreamChunk::Done {
                tokens_used: completion.tokens_used,
            },
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    /// Minimal health probe: a tiny prompt with a tight completion budget.
    async fn probe(&self, api_key: &str, feature: &str) -> Result<Completion, CompletionError> {
        let request = CompletionRequest::new(feature, "Test")
            .with_system_prompt("You are a helpful assistant.")
            .with_max_tokens(10);
        self.complete(api_key, &request).await
    }
}
