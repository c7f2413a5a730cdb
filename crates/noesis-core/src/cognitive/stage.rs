//! Cognitive stage classification with hysteresis.
//!
//! [`StageClassifier::classify`] produces an instantaneous label from the
//! current scores. [`StageClassifier::transition`] gates changes of a node's
//! stored stage behind EMA-smoothed scores so a single noisy sample cannot
//! flip it back and forth.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{CognitiveStage, CognitiveStageScores};

/// EMA period of the hysteresis smoothing.
pub const HYSTERESIS_PERIOD: usize = 5;

/// EMA-smoothed classifier inputs of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedScores {
    pub complexity: f64,
    pub engagement: f64,
    pub centrality: f64,
    pub samples: usize,
}

impl SmoothedScores {
    fn seed(scores: &CognitiveStageScores) -> Self {
        Self {
            complexity: scores.complexity,
            engagement: scores.engagement,
            centrality: scores.centrality,
            samples: 1,
        }
    }

    fn update(&mut self, scores: &CognitiveStageScores) {
        let k = 2.0 / (HYSTERESIS_PERIOD as f64 + 1.0);
        self.complexity = k * scores.complexity + (1.0 - k) * self.complexity;
        self.engagement = k * scores.engagement + (1.0 - k) * self.engagement;
        self.centrality = k * scores.centrality + (1.0 - k) * self.centrality;
        self.samples += 1;
    }
}

/// A permitted stage change and the evidence it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    NoviceToIntermediate,
    IntermediateToExpert,
    ExpertToIntermediate,
}

impl StageTransition {
    pub const ALL: [StageTransition; 3] = [
        StageTransition::NoviceToIntermediate,
        StageTransition::IntermediateToExpert,
        StageTransition::ExpertToIntermediate,
    ];

    pub fn from_stage(&self) -> CognitiveStage {
        match self {
            Self::NoviceToIntermediate => CognitiveStage::Novice,
            Self::IntermediateToExpert => CognitiveStage::Intermediate,
            Self::ExpertToIntermediate => CognitiveStage::Expert,
        }
    }

    pub fn to_stage(&self) -> CognitiveStage {
        match self {
            Self::NoviceToIntermediate => CognitiveStage::Intermediate,
            Self::IntermediateToExpert => CognitiveStage::Expert,
            Self::ExpertToIntermediate => CognitiveStage::Intermediate,
        }
    }

    /// Whether the smoothed evidence supports this transition.
    pub fn permits(&self, smoothed: &SmoothedScores, reference_count: u32) -> bool {
        match self {
            Self::NoviceToIntermediate => smoothed.engagement > 0.4 || smoothed.centrality > 0.3,
            Self::IntermediateToExpert => {
                smoothed.complexity > 0.7 && smoothed.centrality > 0.6 && reference_count >= 2
            }
            Self::ExpertToIntermediate => smoothed.complexity < 0.6 && reference_count < 3,
        }
    }
}

/// Combines complexity, engagement and centrality into a stage label.
#[derive(Debug, Default)]
pub struct StageClassifier {
    smoothed: HashMap<String, SmoothedScores>,
}

/// Normalised dimension weights for a given reference count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageWeights {
    pub complexity: f64,
    pub engagement: f64,
    pub centrality: f64,
}

impl StageWeights {
    pub fn for_references(reference_count: u32) -> Self {
        let complexity = 0.4 + 0.1 * (reference_count as f64 + 1.0).ln();
        let engagement = 0.3;
        let centrality = 0.3;
        let total = complexity + engagement + centrality;
        Self {
            complexity: complexity / total,
            engagement: engagement / total,
            centrality: centrality / total,
        }
    }
}

impl StageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantaneous stage for `scores`.
    pub fn classify(&self, scores: &CognitiveStageScores) -> CognitiveStage {
        let w = StageWeights::for_references(scores.reference_count);
        let complexity = scores.complexity * w.complexity;
        let engagement = scores.engagement * w.engagement;
        let centrality = scores.centrality * w.centrality;

        if complexity > 0.7 * w.complexity && centrality > 0.6 * w.centrality {
            CognitiveStage::Expert
        } else if engagement > 0.4 * w.engagement || centrality > 0.3 * w.centrality {
            CognitiveStage::Intermediate
        } else {
            CognitiveStage::Novice
        }
    }

    /// Fold `scores` into the node's smoothed state and return the stage it
    /// may move to from `current`. At most one step per call.
    pub fn transition(
        &mut self,
        id: &str,
        current: CognitiveStage,
        scores: &CognitiveStageScores,
    ) -> CognitiveStage {
        let smoothed = match self.smoothed.get_mut(id) {
            Some(smoothed) => {
                smoothed.update(scores);
                *smoothed
            }
            None => {
                let seeded = SmoothedScores::seed(scores);
                self.smoothed.insert(id.to_string(), seeded);
                seeded
            }
        };

        let next = StageTransition::ALL
            .iter()
            .find(|t| t.from_stage() == current && t.permits(&smoothed, scores.reference_count))
            .map(StageTransition::to_stage)
            .unwrap_or(current);

        if next != current {
            debug!(node_id = %id, from = %current, to = %next, "Stage transition");
        }
        next
    }

    /// Smoothed state of a node, if any samples were seen.
    pub fn smoothed(&self, id: &str) -> Option<&SmoothedScores> {
        self.smoothed.get(id)
    }

    /// Drop hysteresis state for a node.
    pub fn forget(&mut self, id: &str) {
        self.smoothed.remove(id);
    }
}
