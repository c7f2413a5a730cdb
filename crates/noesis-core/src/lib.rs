//! noesis-core - Core library for noesis.
//!
//! Assigns every document in a personal knowledge base a dynamic cognitive
//! weight (retention, centrality, linguistic complexity) and drives a
//! spaced-repetition review scheduler from it.
//!
//! # Example
//!
//! ```ignore
//! use noesis_core::{KnowledgeGraph, NoesisConfig};
//!
//! let mut graph = KnowledgeGraph::new(NoesisConfig::default());
//! graph.upsert_document("notes/rust.md", "# Ownership\n...", Utc::now()).await?;
//!
//! graph.refresh_centrality();
//! let due = graph.due_files(Utc::now());
//! ```

pub mod cognitive;
pub mod config;
pub mod error;
pub mod graph;
pub mod review;
pub mod runtime;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use cognitive::{
    CentralityEngine, CentralityScores, DecayScheduler, InteractionTracker, MemoryStrengthEngine,
    RankAccumulation, ReviewIntervalPolicy, StageClassifier, StageTransition,
    TextComplexityAnalyzer, WeightModel,
};
pub use config::NoesisConfig;
pub use error::{ErrorCode, NoesisError, NoesisResult};
pub use graph::{KnowledgeGraph, SharedGraph};
pub use review::{LinkInferrer, QuestionGenerator, ReviewQuestion};
pub use runtime::CognitiveRuntime;
pub use store::CognitiveStore;
pub use traits::{Embedder, EmbedderConfig, GenerationOptions, Llm, LlmConfig, LlmResponse};
pub use types::{
    node_id, CognitiveStage, CognitiveStageScores, DocumentEvent, KnowledgeNode,
    MemoryStrengthData, Message, MessageRole, NodeWeight, PersistedNodeState,
};
