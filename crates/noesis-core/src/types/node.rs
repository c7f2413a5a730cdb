//! Knowledge node types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CognitiveStage, MemoryStrengthData};

/// Derive a stable node identifier from a document path.
///
/// The extension of the final path component is dropped and path
/// separators become underscores: `notes/rust.md` -> `notes_rust`.
pub fn node_id(path: &str) -> String {
    let split = path.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let (dir, file) = path.split_at(split);

    // Leading dots are hidden files, not extensions.
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };

    format!("{}{}", dir, stem).replace(['/', '\\'], "_")
}

/// Cognitive weight state of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeWeight {
    /// Committed weight, always within [0, 1].
    pub base: f64,
    /// When `base` was last committed.
    pub last_updated: DateTime<Utc>,
    /// Interactions since the last commit.
    #[serde(default)]
    pub interaction_count: u32,
    /// Engagement EMA; `None` until the first engagement sample.
    #[serde(default)]
    pub previous_engagement: Option<f64>,
}

impl NodeWeight {
    /// Create a weight with the given base, clamped into [0, 1].
    pub fn new(base: f64, now: DateTime<Utc>) -> Self {
        Self {
            base: clamp_unit(base),
            last_updated: now,
            interaction_count: 0,
            previous_engagement: None,
        }
    }

    /// Commit a computed weight as the new base.
    pub fn commit(&mut self, weight: f64, now: DateTime<Utc>) {
        self.base = clamp_unit(weight);
        self.last_updated = now;
    }

    /// Count one more interaction (view, edit).
    pub fn record_interaction(&mut self) {
        self.interaction_count = self.interaction_count.saturating_add(1);
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One tracked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub path: String,
    pub content: String,
    pub weight: NodeWeight,
    /// Feature vector; `None` while stale.
    pub vector: Option<Vec<f32>>,
    /// Outbound link targets in insertion order, without duplicates.
    pub links: Vec<String>,
    pub next_review_date: Option<DateTime<Utc>>,
    pub stage: CognitiveStage,
}

impl KnowledgeNode {
    /// Create a node for a document path.
    pub fn new(path: impl Into<String>, content: impl Into<String>, weight: NodeWeight) -> Self {
        let path = path.into();
        Self {
            id: node_id(&path),
            path,
            content: content.into(),
            weight,
            vector: None,
            links: Vec::new(),
            next_review_date: None,
            stage: CognitiveStage::default(),
        }
    }

    /// Replace the content wholesale, invalidating the feature vector.
    pub fn replace_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.vector = None;
    }

    /// Add an outbound link. Returns false for duplicates and self-links.
    pub fn add_link(&mut self, target: impl Into<String>) -> bool {
        let target = target.into();
        if target == self.id || self.has_link(&target) {
            return false;
        }
        self.links.push(target);
        true
    }

    /// Whether this node links to `target`.
    pub fn has_link(&self, target: &str) -> bool {
        self.links.iter().any(|l| l == target)
    }

    /// Outbound links as a set.
    pub fn link_set(&self) -> HashSet<&str> {
        self.links.iter().map(String::as_str).collect()
    }

    /// Advance the next review date; earlier dates are ignored.
    pub fn schedule_review(&mut self, at: DateTime<Utc>) {
        if self.next_review_date.map_or(true, |current| at > current) {
            self.next_review_date = Some(at);
        }
    }
}

/// Persisted per-document state, keyed by document path.
///
/// Content is not persisted; it is re-read from the document itself.
/// Fields are additive: older records missing newer fields load with
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNodeState {
    pub id: String,
    pub path: String,
    pub weight: NodeWeight,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub next_review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stage: CognitiveStage,
    #[serde(default)]
    pub memory: Option<MemoryStrengthData>,
}
