//! Factory for creating service clients.

use std::sync::Arc;

use noesis_core::config::NoesisConfig;
use noesis_core::error::NoesisResult;
use noesis_core::traits::{Embedder, EmbedderConfig, Llm, LlmConfig};

use crate::openai::OpenAiClient;

/// Factory for creating service clients.
pub struct LlmFactory;

impl LlmFactory {
    /// Create a client from the `llm` and `embedder` sections of `config`.
    pub fn from_config(config: &NoesisConfig) -> NoesisResult<Arc<OpenAiClient>> {
        let client = OpenAiClient::new(config.llm.clone(), config.embedder.clone())?;
        Ok(Arc::new(client))
    }

    /// Create an OpenAI client with default configuration.
    pub fn openai() -> NoesisResult<Arc<dyn Llm>> {
        let client = OpenAiClient::new(LlmConfig::default(), EmbedderConfig::default())?;
        Ok(Arc::new(client))
    }

    /// Create an OpenAI client with a specific chat model.
    pub fn openai_with_model(model: impl Into<String>) -> NoesisResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        let client = OpenAiClient::new(config, EmbedderConfig::default())?;
        Ok(Arc::new(client))
    }

    /// Create an embedder with a specific model.
    pub fn embedder_with_model(
        model: impl Into<String>,
        embedding_dims: usize,
    ) -> NoesisResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims,
            ..Default::default()
        };
        let client = OpenAiClient::new(LlmConfig::default(), config)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_configured_key() {
        let mut config = NoesisConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        config.llm.base_url = Some("http://localhost:11434/v1".to_string());

        let client = LlmFactory::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        assert_eq!(Llm::model_name(client.as_ref()), "gpt-4o-mini");
        assert_eq!(Embedder::model_name(client.as_ref()), "text-embedding-3-large");
        assert_eq!(client.dimension(), 3072);
    }
}
