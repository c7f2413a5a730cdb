//! noesis-llm - OpenAI-compatible service client for noesis.
//!
//! Implements the [`Llm`] and [`Embedder`] collaborators of `noesis-core`
//! over any server speaking the OpenAI chat-completions and embeddings API.
//!
//! # Example
//!
//! ```ignore
//! use noesis_llm::LlmFactory;
//!
//! let config = NoesisConfig::from_env();
//! let client = LlmFactory::from_config(&config)?;
//!
//! let graph = KnowledgeGraph::new(config)
//!     .with_llm(client.clone())
//!     .with_embedder(client);
//! ```

mod factory;
mod openai;

pub use factory::LlmFactory;
pub use openai::{validate_api_key, OpenAiClient, API_KEY_PREFIX, OPENAI_API_URL};

// Re-export core types for convenience
pub use noesis_core::traits::{Embedder, EmbedderConfig, GenerationOptions, Llm, LlmConfig, LlmResponse};
