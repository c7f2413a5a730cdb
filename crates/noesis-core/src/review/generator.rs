//! Review question generation.

use std::sync::Arc;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::QuestionConfig;
use crate::error::NoesisResult;
use crate::traits::{GenerationOptions, Llm, LlmConfig};
use crate::types::{KnowledgeNode, Message};

use super::prompts::question_prompt;
use super::question::{parse_question, ReviewQuestion};

/// Questions generated concurrently by [`QuestionGenerator::generate_batch`].
pub const BATCH_CONCURRENCY: usize = 4;

/// Turns a node's content into a multiple-choice question.
///
/// Transient service errors and unparseable replies are retried with a fixed
/// delay; after `max_retries` retries the last error is returned.
pub struct QuestionGenerator {
    llm: Arc<dyn Llm>,
    config: QuestionConfig,
    options: GenerationOptions,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn Llm>, config: QuestionConfig, llm_config: &LlmConfig) -> Self {
        Self {
            llm,
            config,
            options: GenerationOptions {
                temperature: Some(llm_config.temperature),
                max_tokens: Some(llm_config.max_tokens),
                top_p: Some(llm_config.top_p),
            },
        }
    }

    pub fn config(&self) -> &QuestionConfig {
        &self.config
    }

    /// Generate a question for `node`.
    pub async fn generate(&self, node: &KnowledgeNode) -> NoesisResult<ReviewQuestion> {
        let messages = vec![Message::user(question_prompt(
            &node.content,
            self.config.max_content_chars,
        ))];

        let attempt = || async {
            let response = self
                .llm
                .generate(&messages, Some(self.options.clone()))
                .await?;
            parse_question(response.content_or_empty())
        };

        let question = attempt
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::from_millis(self.config.retry_delay_ms))
                    .with_max_times(self.config.max_retries),
            )
            .when(|e| e.is_retryable())
            .notify(|err, dur| {
                warn!(
                    node_id = %node.id,
                    error = %err,
                    retry_in_ms = dur.as_millis() as u64,
                    "Question generation failed, retrying"
                );
            })
            .await?;

        debug!(node_id = %node.id, options = question.options.len(), "Generated question");
        Ok(question)
    }

    /// Generate questions for several nodes, at most
    /// [`BATCH_CONCURRENCY`] at a time. A failure for one node is reported
    /// in its slot and does not stop the batch.
    pub async fn generate_batch(
        &self,
        nodes: &[KnowledgeNode],
    ) -> Vec<(String, NoesisResult<ReviewQuestion>)> {
        let results: Vec<(String, NoesisResult<ReviewQuestion>)> = stream::iter(nodes)
            .map(|node| async move {
                let result = self.generate(node).await;
                if let Err(e) = &result {
                    warn!(node_id = %node.id, error = %e, "Skipping node without question");
                }
                (node.id.clone(), result)
            })
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        let generated = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!(
            requested = nodes.len(),
            generated,
            "Question batch complete"
        );
        results
    }
}
