use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CompletionError;

/// Model used when a feature has no catalog entry.
pub const DEFAULT_MODEL: &str = "openai/gpt-5.2-chat";

/// Feature-to-model mappings, loaded once at startup from a static JSON file.
///
/// The file maps provider sections to feature tables:
///
/// ```json
/// {
///   "openrouter": { "chat": "anthropic/claude-sonnet-4.5", "vision": "..." },
///   "huggingface": { "chat": "HuggingFaceH4/zephyr-7b-beta" }
/// }
/// ```
///
/// Completion dispatch always resolves through the `openrouter` section:
/// the provider tag on a credential is an operator label, and all shared
/// keys are exercised against the same upstream gateway. The `huggingface`
/// section names the free-tier fallback models probed by the health monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    openrouter: HashMap<String, String>,
    #[serde(default)]
    huggingface: HashMap<String, String>,
}

impl ModelCatalog {
    /// Parse a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, CompletionError> {
        serde_json::from_str(json)
            .map_err(|e| CompletionError::Configuration(format!("invalid model catalog: {e}")))
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CompletionError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CompletionError::Configuration(format!(
                "failed to read model catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    /// Build a catalog directly from feature maps (used in tests).
    #[must_use]
    pub fn from_maps(
        openrouter: HashMap<String, String>,
        huggingface: HashMap<String, String>,
    ) -> Self {
        Self {
            openrouter,
            huggingface,
        }
    }

    /// The completion model for a feature, falling back to [`DEFAULT_MODEL`].
    #[must_use]
    pub fn model_for(&self, feature: &str) -> &str {
        self.openrouter
            .get(feature)
            .map_or(DEFAULT_MODEL, String::as_str)
    }

    /// The vision-capable model: the feature's own entry when present,
    /// otherwise the `image` entry, otherwise the default.
    #[must_use]
    pub fn vision_model_for(&self, feature: &str) -> &str {
        self.openrouter
            .get(feature)
            .or_else(|| self.openrouter.get("image"))
            .map_or(DEFAULT_MODEL, String::as_str)
    }

    /// The Hugging Face fallback model for a feature, if configured.
    #[must_use]
    pub fn fallback_model_for(&self, feature: &str) -> Option<&str> {
        self.huggingface.get(feature).map(String::as_str)
    }

    /// Features that have a configured Hugging Face fallback model.
    #[must_use]
    pub fn fallback_features(&self) -> Vec<&str> {
        let mut features: Vec<&str> = self.huggingface.keys().map(String::as_str).collect();
        features.sort_unstable();
        features
    }
}
