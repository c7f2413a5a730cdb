//! Spaced-repetition state for a single node.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of outcomes kept in the sliding success window.
pub const HISTORY_WINDOW: usize = 100;

/// Success rate assumed when no outcome has been recorded yet.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.7;

/// Review outcome history and derived easiness factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStrengthData {
    /// Easiness factor, always within [1.3, 2.5].
    pub ef: f64,
    pub consecutive_success: u32,
    pub consecutive_failures: u32,
    pub last_test_result: bool,
    /// Most recent outcomes, oldest first, at most [`HISTORY_WINDOW`] long.
    pub history: VecDeque<bool>,
    pub last_review_time: Option<DateTime<Utc>>,
}

impl MemoryStrengthData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a review outcome, evicting the oldest once the window is full.
    pub fn push_outcome(&mut self, correct: bool, now: DateTime<Utc>) {
        if correct {
            self.consecutive_success = self.consecutive_success.saturating_add(1);
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_success = 0;
        }

        self.history.push_back(correct);
        while self.history.len() > HISTORY_WINDOW {
            self.history.pop_front();
        }

        self.last_test_result = correct;
        self.last_review_time = Some(now);
    }

    /// Number of successes in the window.
    pub fn success_count(&self) -> usize {
        self.history.iter().filter(|&&ok| ok).count()
    }

    /// Success rate over the window; [`DEFAULT_SUCCESS_RATE`] when empty.
    pub fn success_rate(&self) -> f64 {
        if self.history.is_empty() {
            DEFAULT_SUCCESS_RATE
        } else {
            self.success_count() as f64 / self.history.len() as f64
        }
    }
}

impl Default for MemoryStrengthData {
    fn default() -> Self {
        Self {
            ef: 2.5,
            consecutive_success: 0,
            consecutive_failures: 0,
            last_test_result: false,
            history: VecDeque::with_capacity(HISTORY_WINDOW),
            last_review_time: None,
        }
    }
}
