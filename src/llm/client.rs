//! LLM client abstraction and provider selection
//!
//! The orchestrator only needs plain text generation: the model is used to
//! phrase the analysis section of a report, never to make routing decisions.

use crate::types::{AppError, Result};
use crate::utils::toml_config::LlmConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2:3b".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Provider described by the `[llm]` section, or `None` when disabled
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        match config.provider.to_lowercase().as_str() {
            "ollama" => Ok(Some(Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model.clone(),
            })),
            other => Err(AppError::Configuration(format!(
                "Unknown LLM provider '{}'",
                other
            ))),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's feature is not compiled in or the
    /// base URL is invalid.
    pub async fn create_client(&self, timeout: Duration) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone(), timeout)?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { model, .. } => {
                let _ = timeout;
                Err(AppError::Configuration(format!(
                    "Ollama support is not compiled in (requested model '{}'); \
                     rebuild with the `ollama` feature",
                    model
                )))
            }
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Ollama { model, .. } => model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_has_no_provider() {
        let config = LlmConfig::default();
        assert!(!config.enabled);
        assert_eq!(Provider::from_config(&config).unwrap(), None);
    }

    #[test]
    fn test_ollama_from_config() {
        let config = LlmConfig {
            enabled: true,
            provider: "Ollama".to_string(),
            ..LlmConfig::default()
        };
        let provider = Provider::from_config(&config).unwrap().unwrap();

        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model(), "llama3.2:3b");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            enabled: true,
            provider: "openai".to_string(),
            ..LlmConfig::default()
        };
        let err = Provider::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider 'openai'"));
    }
}
