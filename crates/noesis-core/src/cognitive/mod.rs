//! Cognitive state scoring.
//!
//! Each component is synchronous and owns at most a satellite map keyed by
//! node id; [`crate::graph::KnowledgeGraph`] wires them together.

mod centrality;
mod complexity;
mod interaction;
mod scheduler;
mod stage;
mod strength;
mod weight;

pub use centrality::{CentralityEngine, CentralityScores, RankAccumulation};
pub use complexity::{strip_markdown, TextComplexityAnalyzer, TextStats, MIN_COMPLEXITY};
pub use interaction::{
    count_links, wiki_link_targets, InteractionSession, InteractionTracker, ENGAGEMENT_SMOOTHING,
};
pub use scheduler::{decay_and_persist, DecayScheduler, DecaySchedulerConfig};
pub use stage::{SmoothedScores, StageClassifier, StageTransition, StageWeights, HYSTERESIS_PERIOD};
pub use strength::{easiness, MemoryStrengthEngine, ReviewIntervalPolicy, ReviewSignals};
pub use weight::{days_between, WeightModel};
