//! Link inference between notes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NoesisResult;
use crate::traits::{GenerationOptions, Llm};
use crate::types::{KnowledgeNode, Message};

use super::json_parser::parse_links;
use super::prompts::link_prompt;

/// A link proposed by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredLink {
    pub target_id: String,
    #[serde(default)]
    pub relation: String,
    pub confidence: f64,
}

/// Asks the LLM which candidates a note should link to.
pub struct LinkInferrer {
    llm: Arc<dyn Llm>,
    max_content_chars: usize,
}

impl LinkInferrer {
    pub fn new(llm: Arc<dyn Llm>, max_content_chars: usize) -> Self {
        Self {
            llm,
            max_content_chars,
        }
    }

    /// Proposed links from `source` to any of `candidates`.
    ///
    /// Returned links are unfiltered: callers apply their confidence
    /// threshold and check that targets exist.
    pub async fn infer(
        &self,
        source: &KnowledgeNode,
        candidates: &[&KnowledgeNode],
    ) -> NoesisResult<Vec<InferredLink>> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let messages = vec![Message::user(link_prompt(
            source,
            candidates,
            self.max_content_chars,
        ))];
        let options = GenerationOptions {
            temperature: Some(0.0),
            ..Default::default()
        };

        let response = self.llm.generate(&messages, Some(options)).await?;
        let links = parse_links(response.content_or_empty())?;
        debug!(
            node_id = %source.id,
            candidates = candidates.len(),
            proposed = links.len(),
            "Inferred links"
        );
        Ok(links)
    }
}
