use serde::Deserialize;

/// Configuration for the HTTP embedding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the inference API
    /// (e.g. `https://api-inference.huggingface.co/models`).
    pub endpoint: String,
    /// Model identifier appended to the endpoint
    /// (e.g. `sentence-transformers/all-mpnet-base-v2`).
    pub model: String,
    /// API key for authentication.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Expected vector dimensionality; responses with a different length are
    /// rejected rather than stored.
    pub dimension: usize,
}

impl EmbeddingConfig {
    /// Build a config with a 30 second timeout and 768-dimension vectors.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_seconds: 30,
            dimension: 768,
        }
    }
}
