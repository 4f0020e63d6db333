use serde::{Deserialize, Serialize};

/// A logical completion request, independent of the upstream vendor.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Feature tag; resolves the model through the catalog.
    pub feature: String,
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
    /// Raw image bytes for vision requests.
    pub image_data: Option<Vec<u8>>,
    /// Completion budget; adapters apply their own default when absent.
    pub max_tokens: Option<u32>,
    /// Sampling temperature; adapters apply their own default when absent.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// A plain text request for a feature.
    #[must_use]
    pub fn new(feature: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            prompt: prompt.into(),
            system_prompt: None,
            image_data: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Attach a system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Attach image bytes, making this a vision request.
    #[must_use]
    pub fn with_image(mut self, image_data: Vec<u8>) -> Self {
        self.image_data = Some(image_data);
        self
    }

    /// Cap the completion budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub content: String,
    /// Tokens consumed, as reported by the vendor or estimated.
    pub tokens_used: u64,
    /// The concrete model that served the request.
    pub model_id: String,
}

/// One element of a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A piece of generated text.
    Delta(String),
    /// The stream finished normally.
    Done {
        /// Tokens consumed, as reported or estimated.
        tokens_used: u64,
    },
    /// The stream failed; this is always the final chunk when it appears.
    Error(String),
}

/// Estimate a token count from text lengths when the vendor omits usage.
///
/// Rough heuristic: one token per four characters of prompt plus response.
#[must_use]
pub fn estimate_tokens(prompt_len: usize, content_len: usize) -> u64 {
    (prompt_len / 4 + content_len / 4) as u64
}
