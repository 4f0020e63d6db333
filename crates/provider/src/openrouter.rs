use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

use crate::adapter::{CompletionStream, ProviderAdapter};
use crate::catalog::ModelCatalog;
use crate::error::{is_token_limit_error, CompletionError};
use crate::types::{estimate_tokens, Completion, CompletionRequest, StreamChunk};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default completion budget when the request does not set one.
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Default sampling temperature when the request does not set one.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Adapter for the OpenRouter chat-completions API.
///
/// All shared-pool traffic goes through this single upstream gateway; the
/// catalog picks the concrete model per feature. The adapter holds a pooled
/// HTTP client and no other state.
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    catalog: Arc<ModelCatalog>,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterAdapter {
    /// Production endpoint.
    pub const BASE_URL: &'static str = "https://openrouter.ai/api/v1";

    /// Create an adapter against the production endpoint.
    pub fn new(catalog: Arc<ModelCatalog>, timeout: Duration) -> Result<Self, CompletionError> {
        Self::with_base_url(catalog, timeout, Self::BASE_URL)
    }

    /// Create an adapter against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        catalog: Arc<ModelCatalog>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            catalog,
            base_url: base_url.into(),
            timeout,
        })
    }

    fn resolve_model(&self, request: &CompletionRequest) -> String {
        if request.image_data.is_some() {
            self.catalog.vision_model_for(&request.feature).to_owned()
        } else {
            self.catalog.model_for(&request.feature).to_owned()
        }
    }

    /// Build the chat-completions payload for a request.
    fn build_payload(model: &str, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::new();

        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }

        let user_content = match &request.image_data {
            Some(image) => {
                let data_uri = format!("data:image/jpeg;base64,{}", B64.encode(image));
                json!([
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": data_uri } }
                ])
            }
            None => json!(request.prompt),
        };
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut payload = json!({
            "model": model,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if stream {
            payload["stream"] = json!(true);
        }
        payload
    }

    fn map_transport_error(&self, e: &reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.timeout)
        } else {
            CompletionError::Network(e.to_string())
        }
    }

    /// Turn a non-success response body into a structured API error.
    fn api_error(status: u16, body: &str) -> CompletionError {
        let (message, code) = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => {
                let message = value["error"]["message"]
                    .as_str()
                    .unwrap_or(body)
                    .to_owned();
                let code = value["error"]["code"].as_str().unwrap_or("").to_owned();
                (message, code)
            }
            Err(_) => (body.to_owned(), String::new()),
        };
        let token_limit = is_token_limit_error(&code, &message);
        CompletionError::Api {
            status,
            message,
            token_limit,
        }
    }

    /// Extract content and usage from a chat-completions response.
    fn parse_completion(
        response: &serde_json::Value,
        model: &str,
        prompt_len: usize,
    ) -> Result<Completion, CompletionError> {
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                CompletionError::Parse(format!("no choices in response: {response}"))
            })?
            .to_owned();

        let mut tokens_used = response["usage"]["total_tokens"].as_u64().unwrap_or(0);
        if tokens_used == 0 {
            tokens_used = estimate_tokens(prompt_len, content.len());
        }

        Ok(Completion {
            content,
            tokens_used,
            model_id: model.to_owned(),
        })
    }

    /// Extract the text delta from one streamed SSE data frame.
    fn parse_stream_delta(data: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(data).ok()?;
        value["choices"][0]["delta"]["content"]
            .as_str()
            .map(str::to_owned)
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    #[instrument(skip(self, api_key, request), fields(feature = %request.feature))]
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, CompletionError> {
        let model = self.resolve_model(request);
        let payload = Self::build_payload(&model, request, false);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(%model, "calling chat completions");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "chat completions returned error");
            return Err(Self::api_error(status.as_u16(), &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        Self::parse_completion(&body, &model, request.prompt.len())
    }

    #[instrument(skip(self, api_key, request), fields(feature = %request.feature))]
    async fn stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let model = self.resolve_model(request);
        let payload = Self::build_payload(&model, request, true);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(status.as_u16(), &body));
        }

        let prompt_len = request.prompt.len();
        let (tx, rx) = tokio::sync::mpsc::channel::<StreamChunk>(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            let mut produced = 0usize;

            'outer: while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamChunk::Error(e.to_string())).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // SSE frames are newline-delimited `data: <json>` lines.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_owned();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break 'outer;
                    }
                    if let Some(delta) = Self::parse_stream_delta(data) {
                        produced += delta.len();
                        if tx.send(StreamChunk::Delta(delta)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            let _ = tx
                .send(StreamChunk::Done {
                    tokens_used: estimate_tokens(prompt_len, produced),
                })
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
