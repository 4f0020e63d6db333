use std::time::Duration;

use serde_json::json;
use tracing::{debug, instrument};

use crate::catalog::ModelCatalog;
use crate::error::CompletionError;
use crate::types::{estimate_tokens, Completion};

/// Client for the Hugging Face inference API, used for free-tier fallback
/// text generation and for probing the fallback models on the health
/// monitor's cadence.
///
/// Unlike the pooled gateway credentials, this client is configured with a
/// single platform-level token.
pub struct HuggingFaceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HuggingFaceClient {
    /// Production endpoint.
    pub const BASE_URL: &'static str = "https://api-inference.huggingface.co/models";

    /// Create a client against the production endpoint.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, CompletionError> {
        Self::with_base_url(api_key, timeout, Self::BASE_URL)
    }

    /// Create a client against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        api_key: impl Into<String>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Generate text with a named fallback model.
    #[instrument(skip(self, prompt))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<Completion, CompletionError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), model);
        debug!(%model, "calling text generation");

        let payload = json!({
            "inputs": prompt,
            "parameters": { "max_new_tokens": max_new_tokens, "return_full_text": false }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout)
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: body,
                token_limit: false,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        // The inference API answers `[{"generated_text": "..."}]`.
        let content = body[0]["generated_text"]
            .as_str()
            .ok_or_else(|| CompletionError::Parse(format!("unexpected response: {body}")))?
            .to_owned();

        Ok(Completion {
            tokens_used: estimate_tokens(prompt.len(), content.len()),
            content,
            model_id: model.to_owned(),
        })
    }

    /// Probe one fallback model with a minimal prompt.
    pub async fn probe(&self, model: &str) -> Result<Completion, CompletionError> {
        self.generate(model, "Test", 10).await
    }

    /// Probe the catalog's fallback models for a small set of representative
    /// features. Returns `(feature, model, result)` per probe.
    pub async fn probe_fallback_models(
        &self,
        catalog: &ModelCatalog,
    ) -> Vec<(String, String, Result<Completion, CompletionError>)> {
        let mut results = Vec::new();
        for feature in catalog.fallback_features() {
            let Some(model) = catalog.fallback_model_for(feature) else {
                continue;
            };
            let result = self.probe(model).await;
            results.push((feature.to_owned(), model.to_owned(), result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MockHfServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockHfServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            Self {
                listener,
                base_url: format!("http://127.0.0.1:{port}"),
            }
        }

        async fn respond_once(self, status_code: u16, body: &str) -> Vec<u8> {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let body = body.to_owned();
            let (mut stream, _) = self.listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            buf
        }
    }

    #[tokio::test]
    async fn generate_parses_generated_text() {
        let server = MockHfServer::start().await;
        let client = HuggingFaceClient::with_base_url(
            "hf_test",
            Duration::from_secs(5),
            server.base_url.clone(),
        )
        .unwrap();

        let body = r#"[{"generated_text": "Generated answer"}]"#;
        let server_handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let result = client
            .generate("HuggingFaceH4/zephyr-7b-beta", "question", 64)
            .await
            .unwrap();
        let request = server_handle.await.unwrap();
        let request_str = String::from_utf8_lossy(&request);

        assert_eq!(result.content, "Generated answer");
        assert!(request_str.contains("Bearer hf_test"));
        assert!(request_str.contains("zephyr-7b-beta"));
    }

    #[tokio::test]
    async fn api_error_surfaces_status() {
        let server = MockHfServer::start().await;
        let client = HuggingFaceClient::with_base_url(
            "hf_test",
            Duration::from_secs(5),
            server.base_url.clone(),
        )
        .unwrap();

        let server_handle = tokio::spawn(async move {
            server
                .respond_once(503, r#"{"error": "model is loading"}"#)
                .await
        });

        let err = client.probe("some/model").await.unwrap_err();
        server_handle.await.unwrap();

        match err {
            CompletionError::Api { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_fallback_models_covers_catalog() {
        // No fallback entries configured means no probes and no network use.
        let catalog = ModelCatalog::from_maps(HashMap::new(), HashMap::new());
        let client =
            HuggingFaceClient::with_base_url("hf", Duration::from_secs(1), "http://127.0.0.1:1")
                .unwrap();
        let results = client.probe_fallback_models(&catalog).await;
        assert!(results.is_empty());
    }
}
