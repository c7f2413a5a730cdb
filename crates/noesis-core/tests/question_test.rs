//! Integration tests for question generation retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use noesis_core::config::QuestionConfig;
use noesis_core::{
    ErrorCode, GenerationOptions, KnowledgeNode, Llm, LlmConfig, LlmResponse, Message, NodeWeight,
    NoesisError, NoesisResult, QuestionGenerator,
};

const WELL_FORMED: &str = "Which keyword moves a closure's captures?\n\
    A. ref\n\
    B. move\n\
    C. static\n\
    ANSWER: B";

/// Replies from a fixed script, repeating the last entry once exhausted.
struct ScriptedLlm {
    replies: Vec<Result<&'static str, ErrorCode>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<&'static str, ErrorCode>>) -> Self {
        Self {
            replies,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> NoesisResult<LlmResponse> {
        assert_eq!(messages.len(), 1);
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies[call.min(self.replies.len() - 1)];
        match reply {
            Ok(text) => Ok(LlmResponse::text(text)),
            Err(ErrorCode::AuthInvalidKey) => Err(NoesisError::authentication("bad key")),
            Err(_) => Err(NoesisError::llm("temporarily unavailable")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn config(max_retries: usize) -> QuestionConfig {
    QuestionConfig {
        max_retries,
        retry_delay_ms: 1,
        ..Default::default()
    }
}

fn node(path: &str) -> KnowledgeNode {
    KnowledgeNode::new(path, "A closure captures by reference unless marked move.", NodeWeight::new(0.5, Utc::now()))
}

#[tokio::test]
async fn test_generates_question_first_try() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok(WELL_FORMED)]));
    let generator = QuestionGenerator::new(llm.clone(), config(3), &LlmConfig::default());

    let question = generator.generate(&node("a.md")).await.unwrap();
    assert_eq!(question.answer, 'B');
    assert!(question.check_answer("b"));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_malformed_replies_exhaust_retries() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok("Not a question at all")]));
    let generator = QuestionGenerator::new(llm.clone(), config(3), &LlmConfig::default());

    let err = generator.generate(&node("a.md")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParseInvalidQuestion);
    assert_eq!(llm.calls(), 4);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        Err(ErrorCode::LlmGenerationFailed),
        Ok("garbage"),
        Ok(WELL_FORMED),
    ]));
    let generator = QuestionGenerator::new(llm.clone(), config(3), &LlmConfig::default());

    let question = generator.generate(&node("a.md")).await.unwrap();
    assert_eq!(question.options.len(), 3);
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_authentication_errors_are_not_retried() {
    let llm = Arc::new(ScriptedLlm::new(vec![Err(ErrorCode::AuthInvalidKey)]));
    let generator = QuestionGenerator::new(llm.clone(), config(3), &LlmConfig::default());

    let err = generator.generate(&node("a.md")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthInvalidKey);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok("garbage")]));
    let generator = QuestionGenerator::new(llm.clone(), config(0), &LlmConfig::default());

    assert!(generator.generate(&node("a.md")).await.is_err());
    assert_eq!(llm.calls(), 1);
}

/// Answers only prompts that mention "closure".
struct TopicalLlm;

#[async_trait]
impl Llm for TopicalLlm {
    async fn generate(
        &self,
        messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> NoesisResult<LlmResponse> {
        if messages[0].content.contains("closure") {
            Ok(LlmResponse::text(WELL_FORMED))
        } else {
            Ok(LlmResponse::text("I cannot write a question for this."))
        }
    }

    fn model_name(&self) -> &str {
        "topical"
    }
}

#[tokio::test]
async fn test_batch_reports_each_node() {
    let generator = QuestionGenerator::new(Arc::new(TopicalLlm), config(1), &LlmConfig::default());
    let unrelated = KnowledgeNode::new("b.md", "Tea steeps best below boiling.", NodeWeight::new(0.5, Utc::now()));

    let results = generator.generate_batch(&[node("a.md"), unrelated, node("c.md")]).await;
    let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
}
