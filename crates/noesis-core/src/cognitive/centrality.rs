//! Damped PageRank-style centrality over the note link graph.
//!
//! This is the simplified fixed-iteration formula used for review
//! prioritisation, not a convergent PageRank: dangling nodes contribute
//! nothing and their mass is not redistributed, so ranks need not sum to 1.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::CentralityConfig;

/// How a node's rank is carried from one iteration to the next.
///
/// The two modes disagree on purpose and neither is deprecated. `Carry`
/// is the additive accumulator that existing rankings were computed with;
/// pick it for numerical parity with them. `Reset` is the default because
/// only it keeps the floor property: a node with no inbound edges settles
/// at `(1 - d) / n`, while under `Carry` every rank keeps growing with the
/// iteration count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RankAccumulation {
    /// Each iteration starts from the random-jump term alone.
    #[default]
    Reset,
    /// Each iteration adds onto the previous rank, which is never reset.
    /// Ranks grow with the iteration count.
    Carry,
}

/// Centrality per node id; unknown ids score 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentralityScores {
    scores: HashMap<String, f64>,
}

impl CentralityScores {
    pub fn get(&self, id: &str) -> f64 {
        self.scores.get(id).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.scores.iter()
    }

    /// Ids sorted by descending score.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> =
            self.scores.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Computes link-graph centrality.
#[derive(Debug, Clone)]
pub struct CentralityEngine {
    config: CentralityConfig,
}

impl CentralityEngine {
    pub fn new(config: CentralityConfig) -> Self {
        Self { config }
    }

    /// Centrality of every node in `nodes`, given as `(id, outbound links)`.
    ///
    /// Links to ids not present in `nodes` are ignored; repeated links to
    /// the same target count once.
    pub fn centrality<'a, I, L>(&self, nodes: I) -> CentralityScores
    where
        I: IntoIterator<Item = (&'a str, L)>,
        L: IntoIterator<Item = &'a str>,
    {
        let nodes: Vec<(&str, Vec<&str>)> = nodes
            .into_iter()
            .map(|(id, links)| (id, links.into_iter().collect()))
            .collect();

        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
        for (id, _) in &nodes {
            index.entry(*id).or_insert_with(|| graph.add_node(*id));
        }
        for (source, links) in &nodes {
            let from = index[source];
            for target in links {
                if let Some(&to) = index.get(target) {
                    if graph.find_edge(from, to).is_none() {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        let ranks = self.iterate(&graph);
        CentralityScores {
            scores: graph
                .node_indices()
                .map(|idx| (graph[idx].to_string(), ranks[idx.index()]))
                .collect(),
        }
    }

    fn iterate(&self, graph: &DiGraph<&str, ()>) -> Vec<f64> {
        let n = graph.node_count();
        if n == 0 {
            return Vec::new();
        }

        let d = self.config.damping_factor;
        let jump = (1.0 - d) / n as f64;
        let mut ranks = vec![1.0 / n as f64; n];

        for _ in 0..self.config.iterations {
            let mut next = match self.config.accumulation {
                RankAccumulation::Reset => vec![jump; n],
                RankAccumulation::Carry => ranks.iter().map(|r| r + jump).collect(),
            };

            for source in graph.node_indices() {
                let out_degree = graph.edges(source).count();
                if out_degree == 0 {
                    continue;
                }
                let share = d * ranks[source.index()] / out_degree as f64;
                for edge in graph.edges(source) {
                    next[edge.target().index()] += share;
                }
            }

            ranks = next;
        }

        ranks
    }
}

impl Default for CentralityEngine {
    fn default() -> Self {
        Self::new(CentralityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(accumulation: RankAccumulation) -> CentralityEngine {
        CentralityEngine::new(CentralityConfig {
            accumulation,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_graph() {
        let scores = CentralityEngine::default().centrality(Vec::<(&str, Vec<&str>)>::new());
        assert!(scores.is_empty());
        assert_eq!(scores.get("anything"), 0.0);
    }

    #[test]
    fn test_no_edges_settles_at_jump_floor() {
        let nodes: Vec<(&str, Vec<&str>)> =
            vec![("a", vec![]), ("b", vec![]), ("c", vec![]), ("d", vec![])];
        let scores = CentralityEngine::default().centrality(nodes);
        for id in ["a", "b", "c", "d"] {
            assert!((scores.get(id) - 0.15 / 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_hub_ranks_highest() {
        let nodes = vec![
            ("hub", vec![]),
            ("a", vec!["hub"]),
            ("b", vec!["hub"]),
            ("c", vec!["hub", "a"]),
        ];
        let scores = CentralityEngine::default().centrality(nodes);
        let ranked = scores.ranked();
        assert_eq!(ranked[0].0, "hub");
        assert!(scores.get("a") > scores.get("b"));
    }

    #[test]
    fn test_unknown_targets_and_duplicates_ignored() {
        let with_noise = vec![("a", vec!["b", "b", "ghost"]), ("b", vec![])];
        let clean = vec![("a", vec!["b"]), ("b", vec![])];
        let engine = CentralityEngine::default();
        assert_eq!(engine.centrality(with_noise), engine.centrality(clean));
        assert_eq!(engine.centrality(vec![("a", vec!["ghost"])]).get("ghost"), 0.0);
    }

    #[test]
    fn test_dangling_mass_is_not_redistributed() {
        let nodes = vec![("a", vec!["b"]), ("b", vec![])];
        let scores = CentralityEngine::default().centrality(nodes);
        let total: f64 = scores.iter().map(|(_, v)| v).sum();
        assert!(total < 1.0);
    }

    #[test]
    fn test_carry_mode_keeps_accumulating() {
        // The carried variant grows every iteration even without edges:
        // 1/n + iterations * (1 - d)/n.
        let nodes: Vec<(&str, Vec<&str>)> = vec![("a", vec![]), ("b", vec![])];
        let carried = engine(RankAccumulation::Carry).centrality(nodes.clone());
        let reset = engine(RankAccumulation::Reset).centrality(nodes);
        assert!((carried.get("a") - (0.5 + 10.0 * 0.075)).abs() < 1e-12);
        assert!((reset.get("a") - 0.075).abs() < 1e-12);
    }

    #[test]
    fn test_both_modes_are_selectable() {
        assert_eq!(CentralityConfig::default().accumulation, RankAccumulation::Reset);
        assert_eq!("carry".parse::<RankAccumulation>().unwrap(), RankAccumulation::Carry);
        assert_eq!(RankAccumulation::Carry.to_string(), "carry");
    }
}
