//! Knowledge graph orchestration.
//!
//! [`KnowledgeGraph`] owns the node map and wires the scoring components
//! together. Scoring is synchronous; only embedding and link inference
//! suspend.

mod similarity;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cognitive::{
    wiki_link_targets, CentralityEngine, CentralityScores, InteractionTracker,
    MemoryStrengthEngine, StageClassifier, TextComplexityAnalyzer, WeightModel,
};
use crate::config::NoesisConfig;
use crate::error::{NoesisError, NoesisResult};
use crate::review::LinkInferrer;
use crate::traits::{Embedder, Llm};
use crate::types::{
    node_id, CognitiveStage, CognitiveStageScores, DocumentEvent, KnowledgeNode,
    PersistedNodeState,
};

pub use similarity::{
    cosine_similarity, node_similarity, structural_features, temporal_features,
    TEMPORAL_WINDOW_DAYS,
};

/// Graph shared between the host and background tasks. Every mutation
/// takes the lock, which serializes updates per node and gives daily decay
/// exclusive access.
pub type SharedGraph = Arc<Mutex<KnowledgeGraph>>;

/// The node store and its satellite scoring state.
pub struct KnowledgeGraph {
    config: NoesisConfig,
    nodes: HashMap<String, KnowledgeNode>,
    /// Wiki link targets written in each node's text, resolved lazily.
    text_links: HashMap<String, Vec<String>>,
    /// Persisted state of documents not yet re-read, keyed by path.
    pending: HashMap<String, PersistedNodeState>,
    weight_model: WeightModel,
    interactions: InteractionTracker,
    complexity: TextComplexityAnalyzer,
    centrality_engine: CentralityEngine,
    centrality: CentralityScores,
    classifier: StageClassifier,
    memory: MemoryStrengthEngine,
    embedder: Option<Arc<dyn Embedder>>,
    link_inferrer: Option<LinkInferrer>,
    last_decay_day: Option<NaiveDate>,
}

impl KnowledgeGraph {
    pub fn new(config: NoesisConfig) -> Self {
        Self {
            weight_model: WeightModel::new(config.weight.clone()),
            centrality_engine: CentralityEngine::new(config.centrality.clone()),
            config,
            nodes: HashMap::new(),
            text_links: HashMap::new(),
            pending: HashMap::new(),
            interactions: InteractionTracker::new(),
            complexity: TextComplexityAnalyzer::new(),
            centrality: CentralityScores::default(),
            classifier: StageClassifier::new(),
            memory: MemoryStrengthEngine::new(),
            embedder: None,
            link_inferrer: None,
            last_decay_day: None,
        }
    }

    /// Use `embedder` for the semantic part of feature vectors.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use `llm` for link inference.
    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.link_inferrer = Some(LinkInferrer::new(
            llm,
            self.config.questions.max_content_chars,
        ));
        self
    }

    /// Wrap the graph for sharing across tasks.
    pub fn shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &NoesisConfig {
        &self.config
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    pub fn get_by_path(&self, path: &str) -> Option<&KnowledgeNode> {
        self.nodes.get(&node_id(path))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &KnowledgeNode> {
        self.nodes.values()
    }

    fn node(&self, id: &str) -> NoesisResult<&KnowledgeNode> {
        self.nodes.get(id).ok_or_else(|| NoesisError::not_found(id))
    }

    fn node_mut(&mut self, id: &str) -> NoesisResult<&mut KnowledgeNode> {
        self.nodes.get_mut(id).ok_or_else(|| NoesisError::not_found(id))
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Insert or update the node for a document. Returns the node id.
    ///
    /// A new document gets a seeded weight (or its persisted state, if one
    /// was restored). An edit replaces the content, counts as an
    /// interaction and invalidates the vector. Re-sending identical content
    /// only refreshes a missing vector.
    pub async fn upsert_document(
        &mut self,
        path: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> NoesisResult<String> {
        let id = node_id(path);

        match self.nodes.get_mut(&id) {
            Some(node) if node.content == content => {
                if node.vector.is_some() {
                    return Ok(id);
                }
            }
            Some(node) => {
                node.replace_content(content);
                node.weight.record_interaction();
                debug!(node_id = %id, interactions = node.weight.interaction_count, "Document modified");
            }
            None => {
                let node = match self.pending.remove(path) {
                    Some(state) => self.revive(state, content),
                    None => KnowledgeNode::new(path, content, self.weight_model.seed(now)),
                };
                debug!(node_id = %id, weight = node.weight.base, "Document added");
                self.nodes.insert(id.clone(), node);
            }
        }

        self.text_links.insert(id.clone(), wiki_link_targets(content));
        self.refresh_vector(&id, now).await;
        self.find_links_for_node(&id).await?;
        Ok(id)
    }

    /// Apply a host document event.
    pub async fn apply_event(
        &mut self,
        event: &DocumentEvent,
        now: DateTime<Utc>,
    ) -> NoesisResult<String> {
        self.upsert_document(event.path(), event.content(), now).await
    }

    fn revive(&mut self, state: PersistedNodeState, content: &str) -> KnowledgeNode {
        let mut node = KnowledgeNode::new(state.path, content, state.weight);
        node.links = state.links;
        node.next_review_date = state.next_review_date;
        node.stage = state.stage;
        if let Some(memory) = state.memory {
            self.memory.restore(&node.id, memory);
        }
        node
    }

    async fn refresh_vector(&mut self, id: &str, now: DateTime<Utc>) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        let mut vector = match &self.embedder {
            Some(embedder) => match embedder.embed(&node.content).await {
                Ok(semantic) => semantic,
                Err(e) => {
                    warn!(node_id = %id, error = %e, "Embedding failed, using structural features only");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        vector.extend(structural_features(&node.content, &self.complexity));
        vector.extend(temporal_features(node.weight.last_updated, now));

        if let Some(node) = self.nodes.get_mut(id) {
            node.vector = Some(vector);
        }
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Similarity of two nodes; 0 when either is unknown.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => node_similarity(a, b),
            _ => 0.0,
        }
    }

    /// Ask the link inferrer for new outbound links of `id` and add the
    /// confident ones. Returns the links that were added.
    ///
    /// Without an inferrer, or when inference fails, no links are added.
    pub async fn find_links_for_node(&mut self, id: &str) -> NoesisResult<Vec<String>> {
        let source = self.node(id)?;
        let Some(inferrer) = &self.link_inferrer else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<(&KnowledgeNode, f64)> = self
            .nodes
            .values()
            .filter(|n| n.id != id)
            .map(|n| (n, node_similarity(source, n)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        ranked.truncate(self.config.links.max_candidates);
        let candidates: Vec<&KnowledgeNode> = ranked.into_iter().map(|(n, _)| n).collect();

        let proposed = match inferrer.infer(source, &candidates).await {
            Ok(links) => links,
            Err(e) => {
                warn!(node_id = %id, error = %e, "Link inference failed");
                return Ok(Vec::new());
            }
        };

        let threshold = self.config.links.confidence_threshold;
        let accepted: Vec<String> = proposed
            .into_iter()
            .filter(|l| {
                l.confidence > threshold && l.target_id != id && self.nodes.contains_key(&l.target_id)
            })
            .map(|l| l.target_id)
            .collect();

        let node = self.node_mut(id)?;
        let added: Vec<String> = accepted
            .into_iter()
            .filter(|target| node.add_link(target.clone()))
            .collect();

        if !added.is_empty() {
            debug!(node_id = %id, added = added.len(), "Added inferred links");
        }
        Ok(added)
    }

    // ------------------------------------------------------------------
    // Scores and stages
    // ------------------------------------------------------------------

    /// Outbound edges of `node`: its inferred links plus the wiki links in
    /// its text that name a known node. Set semantics, no self-links.
    pub fn outbound_links<'a>(&'a self, node: &'a KnowledgeNode) -> Vec<&'a str> {
        let mut out: Vec<&str> = node.links.iter().map(String::as_str).collect();
        let written = self
            .text_links
            .get(&node.id)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|t| *t != node.id && self.nodes.contains_key(*t));
        for target in written {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    /// Recompute centrality over the whole link graph.
    pub fn refresh_centrality(&mut self) -> &CentralityScores {
        let scores = {
            let edges: Vec<(&str, Vec<&str>)> = self
                .nodes
                .values()
                .map(|n| (n.id.as_str(), self.outbound_links(n)))
                .collect();
            self.centrality_engine.centrality(edges)
        };
        self.centrality = scores;
        debug!(nodes = self.centrality.len(), "Centrality refreshed");
        &self.centrality
    }

    /// Cached centrality from the last refresh.
    pub fn centrality(&self) -> &CentralityScores {
        &self.centrality
    }

    /// Number of other nodes linking to `id`, inferred or written.
    pub fn reference_count(&self, id: &str) -> u32 {
        self.nodes
            .values()
            .filter(|n| n.id != id && self.outbound_links(n).contains(&id))
            .count() as u32
    }

    /// Current classifier inputs of `id`. Updates the engagement EMA.
    pub fn stage_scores(&mut self, id: &str) -> NoesisResult<CognitiveStageScores> {
        let reference_count = self.reference_count(id);
        let centrality = self.centrality.get(id);
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| NoesisError::not_found(id))?;

        let engagement = self.interactions.engagement(id, &mut node.weight);
        Ok(CognitiveStageScores {
            complexity: self.complexity.complexity(&node.content),
            engagement: engagement.clamp(0.0, 1.0),
            centrality,
            reference_count,
        })
    }

    /// Instantaneous stage of `id`; does not change the stored stage.
    pub fn classify_stage(&mut self, id: &str) -> NoesisResult<CognitiveStage> {
        let scores = self.stage_scores(id)?;
        Ok(self.classifier.classify(&scores))
    }

    /// Move the stored stage of `id` through the hysteresis rules.
    pub fn advance_stage(&mut self, id: &str) -> NoesisResult<CognitiveStage> {
        let scores = self.stage_scores(id)?;
        let current = self.node(id)?.stage;
        let next = self.classifier.transition(id, current, &scores);
        self.node_mut(id)?.stage = next;
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    pub fn start_tracking(&mut self, id: &str, now: DateTime<Utc>) -> NoesisResult<()> {
        let node = self.nodes.get(id).ok_or_else(|| NoesisError::not_found(id))?;
        self.interactions.start_tracking(id, &node.content, now);
        Ok(())
    }

    pub fn record_duration(&mut self, id: &str, now: DateTime<Utc>) {
        self.interactions.record_duration(id, now);
    }

    /// Close the viewing session of `id`, counting it as an interaction.
    pub fn stop_tracking(&mut self, id: &str) {
        if self.interactions.stop_tracking(id).is_some() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.weight.record_interaction();
            }
        }
    }

    /// Smoothed engagement of `id`.
    pub fn engagement(&mut self, id: &str) -> NoesisResult<f64> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| NoesisError::not_found(id))?;
        Ok(self.interactions.engagement(id, &mut node.weight))
    }

    // ------------------------------------------------------------------
    // Review
    // ------------------------------------------------------------------

    /// Record a review outcome and push the next review date forward.
    /// Returns the node's next review date.
    pub fn record_review(
        &mut self,
        id: &str,
        correct: bool,
        now: DateTime<Utc>,
    ) -> NoesisResult<DateTime<Utc>> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| NoesisError::not_found(id))?;
        self.memory.record_outcome(id, correct, now);

        let weight = self.weight_model.current_weight(&node.weight, now).clamp(0.0, 1.0);
        let interval = self
            .config
            .review
            .interval_policy
            .interval_days(weight, self.config.review.max_review_interval);
        node.schedule_review(now + Duration::days(interval as i64));

        let next = node.next_review_date.unwrap_or(now);
        debug!(node_id = %id, correct, interval_days = interval, next_review = %next, "Review recorded");
        Ok(next)
    }

    /// Current memory strength of `id`.
    pub fn strength(&mut self, id: &str) -> f64 {
        self.memory.strength(id)
    }

    pub fn memory(&self) -> &MemoryStrengthEngine {
        &self.memory
    }

    /// Whether `id` is due for review at `now`.
    pub fn is_due(&mut self, id: &str, now: DateTime<Utc>) -> NoesisResult<bool> {
        let node = self.nodes.get(id).ok_or_else(|| NoesisError::not_found(id))?;
        let weight = self.weight_model.current_weight(&node.weight, now).clamp(0.0, 1.0);
        Ok(self.memory.is_due(id, weight, now))
    }

    /// Paths of documents due for review, shuffled and capped at
    /// `max_review_batch`.
    pub fn due_files(&mut self, now: DateTime<Utc>) -> Vec<String> {
        self.due_files_with_rng(now, &mut rand::thread_rng())
    }

    pub fn due_files_with_rng<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<String> {
        let mut nodes: Vec<&KnowledgeNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut due: Vec<String> = Vec::new();
        for node in nodes {
            let weight = self
                .weight_model
                .current_weight(&node.weight, now)
                .clamp(0.0, 1.0);
            if self.memory.is_due(&node.id, weight, now) {
                due.push(node.path.clone());
            }
        }

        let total = due.len();
        due.shuffle(rng);
        due.truncate(self.config.review.max_review_batch);
        info!(due = total, selected = due.len(), "Selected due files");
        due
    }

    // ------------------------------------------------------------------
    // Decay and persistence
    // ------------------------------------------------------------------

    /// Commit decayed weights for every node. Runs at most once per UTC
    /// calendar day; returns the number of nodes decayed, or `None` if
    /// decay already ran on `now`'s day.
    pub fn run_daily_decay(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let today = now.date_naive();
        if self.last_decay_day == Some(today) {
            info!(day = %today, "Daily decay already ran, skipping");
            return None;
        }

        for node in self.nodes.values_mut() {
            self.weight_model.apply_daily_decay(&mut node.weight, now);
        }
        self.last_decay_day = Some(today);

        info!(day = %today, nodes = self.nodes.len(), "Daily decay complete");
        Some(self.nodes.len())
    }

    pub fn last_decay_day(&self) -> Option<NaiveDate> {
        self.last_decay_day
    }

    /// Set the day decay last ran, as loaded from storage.
    pub fn set_last_decay_day(&mut self, day: Option<NaiveDate>) {
        self.last_decay_day = day;
    }

    /// State of every node, plus restored state of documents not yet
    /// re-read.
    pub fn snapshot(&self) -> Vec<PersistedNodeState> {
        let mut states: Vec<PersistedNodeState> = self
            .nodes
            .values()
            .map(|node| PersistedNodeState {
                id: node.id.clone(),
                path: node.path.clone(),
                weight: node.weight.clone(),
                links: node.links.clone(),
                next_review_date: node.next_review_date,
                stage: node.stage,
                memory: self.memory.data(&node.id).cloned(),
            })
            .chain(self.pending.values().cloned())
            .collect();
        states.sort_by(|a, b| a.path.cmp(&b.path));
        states
    }

    /// Load persisted state. Known nodes are updated in place; state of
    /// other documents is applied when they are first upserted.
    pub fn restore(&mut self, states: Vec<PersistedNodeState>) {
        let count = states.len();
        for state in states {
            match self.nodes.get_mut(&state.id) {
                Some(node) => {
                    node.weight = state.weight;
                    node.links = state.links;
                    node.next_review_date = state.next_review_date;
                    node.stage = state.stage;
                    if let Some(memory) = state.memory {
                        self.memory.restore(&state.id, memory);
                    }
                }
                None => {
                    self.pending.insert(state.path.clone(), state);
                }
            }
        }
        info!(count, pending = self.pending.len(), "Restored node state");
    }
}
