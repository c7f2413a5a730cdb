//! Memory strength and review scheduling.
//!
//! Strength is re-derived from the outcome window on every call: the
//! easiness factor is not incremental, so a single lucky answer cannot
//! carry a node for long.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use super::weight::days_between;
use crate::types::MemoryStrengthData;

const MIN_EF: f64 = 1.3;
const MAX_EF: f64 = 2.5;

/// Inputs of the due-for-review decision for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSignals {
    pub strength: f64,
    pub consecutive_success: u32,
    /// Successes in the outcome window.
    pub success_count: usize,
    /// Current node weight.
    pub weight: f64,
    /// Days since the last review; infinite when never reviewed.
    pub days_since_review: f64,
}

impl ReviewSignals {
    /// A node is due if it is weak and not on a streak, heavy and not
    /// reviewed for two days, or stale with few recorded successes.
    pub fn is_due(&self) -> bool {
        let weak = self.strength < 0.8 && self.consecutive_success < 3;
        let heavy = self.weight > 0.6 && self.days_since_review >= 2.0;
        let stale = self.days_since_review >= 7.0 && self.success_count < 3;
        weak || heavy || stale
    }
}

/// Formula turning a weight into the next review interval.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReviewIntervalPolicy {
    /// `round(10 * (1 - w))`: heavier nodes come back sooner.
    #[default]
    Linear,
    /// `round(2^(5w))`: heavier nodes are spaced further apart.
    Exponential,
}

impl ReviewIntervalPolicy {
    /// Interval in whole days, within `[1, max_interval]`.
    pub fn interval_days(&self, weight: f64, max_interval: u32) -> u32 {
        let weight = if weight.is_nan() { 0.0 } else { weight };
        let raw = match self {
            Self::Linear => (10.0 * (1.0 - weight)).round(),
            Self::Exponential => 2f64.powf(5.0 * weight).round(),
        };
        let max = max_interval.max(1);
        raw.clamp(1.0, max as f64) as u32
    }
}

/// Per-node spaced-repetition state.
#[derive(Debug, Default)]
pub struct MemoryStrengthEngine {
    states: HashMap<String, MemoryStrengthData>,
}

impl MemoryStrengthEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a review outcome, initialising state on first use.
    pub fn record_outcome(&mut self, id: &str, correct: bool, now: DateTime<Utc>) {
        let data = self.states.entry(id.to_string()).or_default();
        data.push_outcome(correct, now);
        debug!(
            node_id = %id,
            correct,
            consecutive_success = data.consecutive_success,
            consecutive_failures = data.consecutive_failures,
            "Recorded review outcome"
        );
    }

    /// Current strength of `id`.
    ///
    /// Recomputes and stores the easiness factor. Nodes that were never
    /// tested get the strength of default state without gaining an entry.
    pub fn strength(&mut self, id: &str) -> f64 {
        match self.states.get_mut(id) {
            Some(data) => {
                data.ef = easiness(data.success_rate());
                strength_of(data)
            }
            None => {
                let mut data = MemoryStrengthData::default();
                data.ef = easiness(data.success_rate());
                strength_of(&data)
            }
        }
    }

    /// Whether `id` should be offered for review at `now`.
    pub fn is_due(&mut self, id: &str, weight: f64, now: DateTime<Utc>) -> bool {
        self.signals(id, weight, now).is_due()
    }

    /// Collect the due-decision inputs for `id`.
    pub fn signals(&mut self, id: &str, weight: f64, now: DateTime<Utc>) -> ReviewSignals {
        let strength = self.strength(id);
        let (consecutive_success, success_count, last_review) = self
            .states
            .get(id)
            .map(|d| (d.consecutive_success, d.success_count(), d.last_review_time))
            .unwrap_or((0, 0, None));

        ReviewSignals {
            strength,
            consecutive_success,
            success_count,
            weight,
            days_since_review: last_review
                .map(|at| days_between(at, now))
                .unwrap_or(f64::INFINITY),
        }
    }

    pub fn data(&self, id: &str) -> Option<&MemoryStrengthData> {
        self.states.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<MemoryStrengthData> {
        self.states.remove(id)
    }

    /// Replace the state of `id`, as loaded from storage.
    pub fn restore(&mut self, id: &str, data: MemoryStrengthData) {
        self.states.insert(id.to_string(), data);
    }

    /// Copy of every node's state.
    pub fn snapshot(&self) -> HashMap<String, MemoryStrengthData> {
        self.states.clone()
    }
}

/// Easiness factor for a window success rate.
pub fn easiness(rate: f64) -> f64 {
    let alpha = rate * 10.0;
    let beta = (1.0 - rate) * 10.0;
    let ef = if alpha + beta > 0.0 {
        beta * 0.8 / (alpha + beta)
    } else {
        MIN_EF
    };
    ef.clamp(MIN_EF, MAX_EF)
}

fn strength_of(data: &MemoryStrengthData) -> f64 {
    if data.last_test_result {
        data.ef * (1.0 + 0.2 * (data.consecutive_success as f64 + 1.0).ln())
    } else {
        (data.ef * 0.6 * (1.0 - 0.1 * data.consecutive_failures as f64)).max(1.0)
    }
}
