//! # Generation Models
//!
//! Model selection for the three remote calls a pipeline run makes.
//!
//! ## Example
//! ```rust,ignore
//! use pinterestify_core::models::{GenerationModels, ModelConfig};
//!
//! let mut models = GenerationModels::default();
//! models.visualization = ModelConfig::new("gemini-2.5-flash-image")
//!     .with_base_url("http://localhost:8080");
//! ```

use serde::{Deserialize, Serialize};

/// Public Gemini API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables consulted for the API key, in order
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Configuration for one model endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name (e.g., "gemini-2.5-flash")
    pub model: String,
    /// Optional base URL override, for proxies and tests
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Base URL with any trailing slash removed
    pub fn endpoint_base(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Full `generateContent` URL for this model
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint_base(),
            self.model
        )
    }
}

/// Per-call model selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationModels {
    /// Structured renovation plan
    pub analysis: ModelConfig,
    /// Image-to-image room rendering
    pub visualization: ModelConfig,
    /// Product bounding boxes on the rendered image
    pub detection: ModelConfig,
}

impl Default for GenerationModels {
    fn default() -> Self {
        Self {
            analysis: ModelConfig::new("gemini-2.5-flash"),
            visualization: ModelConfig::new("gemini-2.5-flash-image"),
            detection: ModelConfig::new("gemini-2.5-flash"),
        }
    }
}

/// First non-empty API key from the environment
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let models = GenerationModels::default();
        assert_eq!(models.analysis.model, "gemini-2.5-flash");
        assert_eq!(models.visualization.model, "gemini-2.5-flash-image");
        assert_eq!(models.detection.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_generate_content_url() {
        let config = ModelConfig::new("gemini-2.5-flash");
        assert_eq!(
            config.generate_content_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let config = config.with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            config.generate_content_url(),
            "http://127.0.0.1:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_partial_config_deserialization() {
        let models: GenerationModels =
            serde_json::from_str(r#"{"analysis":{"model":"gemini-2.5-pro"}}"#).unwrap();
        assert_eq!(models.analysis.model, "gemini-2.5-pro");
        assert_eq!(models.analysis.base_url, None);
        assert_eq!(models.visualization.model, "gemini-2.5-flash-image");
    }
}
