//! Node feature vectors and pairwise similarity.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cognitive::{count_links, days_between, strip_markdown, TextComplexityAnalyzer};
use crate::types::KnowledgeNode;

/// Width of the temporal similarity window, in days.
pub const TEMPORAL_WINDOW_DAYS: f64 = 30.0;

const COSINE_WEIGHT: f64 = 0.6;
const JACCARD_WEIGHT: f64 = 0.3;
const TEMPORAL_WEIGHT: f64 = 0.1;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#{1,6}\s").unwrap());

/// Structural features: link, word and heading counts squashed into
/// `[0, 1)`, followed by the complexity score.
pub fn structural_features(content: &str, analyzer: &TextComplexityAnalyzer) -> [f32; 4] {
    let links = count_links(content) as f64;
    let words = if content.trim().is_empty() {
        0.0
    } else {
        analyzer.stats(&strip_markdown(content)).words as f64
    };
    let headings = HEADING_RE.find_iter(content).count() as f64;

    [
        saturate(links, 5.0) as f32,
        saturate(words, 500.0) as f32,
        saturate(headings, 5.0) as f32,
        analyzer.complexity(content) as f32,
    ]
}

/// Temporal features: age of the weight, then the day of year on the unit
/// circle.
pub fn temporal_features(last_updated: DateTime<Utc>, now: DateTime<Utc>) -> [f32; 3] {
    let age = saturate(days_between(last_updated, now), TEMPORAL_WINDOW_DAYS);
    let angle = 2.0 * PI * now.ordinal() as f64 / 365.0;
    [age as f32, angle.sin() as f32, angle.cos() as f32]
}

fn saturate(value: f64, half: f64) -> f64 {
    value / (value + half)
}

/// Blend of vector cosine, link-set overlap and temporal proximity.
pub fn node_similarity(a: &KnowledgeNode, b: &KnowledgeNode) -> f64 {
    let cosine = match (&a.vector, &b.vector) {
        (Some(va), Some(vb)) => cosine_similarity(va, vb),
        _ => 0.0,
    };
    let jaccard = jaccard_similarity(a, b);
    let days_apart = (a.weight.last_updated - b.weight.last_updated)
        .num_milliseconds()
        .abs() as f64
        / 86_400_000.0;
    let temporal = (1.0 - days_apart / TEMPORAL_WINDOW_DAYS).max(0.0);

    COSINE_WEIGHT * cosine + JACCARD_WEIGHT * jaccard + TEMPORAL_WEIGHT * temporal
}

/// Cosine of two vectors; 0 for mismatched lengths or zero norms.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

fn jaccard_similarity(a: &KnowledgeNode, b: &KnowledgeNode) -> f64 {
    let set_a = a.link_set();
    let set_b = b.link_set();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}
