use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

/// An embedding provider that calls a Hugging Face feature-extraction
/// inference endpoint.
///
/// The endpoint takes `{"inputs": <text>}` and answers with a bare JSON
/// array of floats (some deployments wrap it in one more array level for
/// token-pooled outputs; both shapes are accepted).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    /// Create a new HTTP embedding provider from the given configuration.
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EmbeddingError::HttpError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Accept either `[f32; N]` or `[[f32; N]]` response bodies.
    fn parse_vector(value: serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
        fn as_floats(value: &serde_json::Value) -> Option<Vec<f32>> {
            value.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(serde_json::Value::as_f64)
                    .map(|f| f as f32)
                    .collect()
            })
        }

        let array = value
            .as_array()
            .ok_or_else(|| EmbeddingError::ParseError("response is not an array".to_owned()))?;

        // Nested shape: take the first row.
        if let Some(first) = array.first() {
            if first.is_array() {
                return as_floats(first)
                    .ok_or_else(|| EmbeddingError::ParseError("empty nested array".to_owned()));
            }
        }

        as_floats(&value).ok_or_else(|| EmbeddingError::ParseError("empty array".to_owned()))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(model = %self.config.model, text_len = text.len(), "requesting embedding");

        let url = format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::HttpError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".to_owned());
            return Err(EmbeddingError::ApiError(format!("status {status}: {body}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ParseError(e.to_string()))?;

        let vector = Self::parse_vector(value)?;

        if vector.len() != self.config.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}
