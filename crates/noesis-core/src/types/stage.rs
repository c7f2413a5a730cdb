//! Cognitive stage labels and classifier inputs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Three-level ordinal mastery label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CognitiveStage {
    #[default]
    Novice,
    Intermediate,
    Expert,
}

/// Per-node classifier inputs, each roughly within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CognitiveStageScores {
    pub complexity: f64,
    pub engagement: f64,
    pub centrality: f64,
    pub reference_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stage_labels() {
        assert_eq!(CognitiveStage::Expert.to_string(), "expert");
        assert_eq!(
            CognitiveStage::from_str("Intermediate").unwrap(),
            CognitiveStage::Intermediate
        );
        assert!(CognitiveStage::Novice < CognitiveStage::Expert);
    }
}
