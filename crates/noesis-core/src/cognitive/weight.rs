//! Cognitive weight decay model.
//!
//! The weight of a node decays with the square root of elapsed days and is
//! boosted by interactions with diminishing returns:
//!
//! ```text
//! lambda     = decay_lambda + amplitude * sin(2π * day_of_year / 365)
//! time_decay = alpha * base * exp(-lambda * sqrt(days))
//! beta       = beta_coefficient * (1 + 0.5 * tanh((N - 3) / 2))
//! boost      = beta * (1 - 1 / (1 + log2(N + 1)))
//! weight     = round2(time_decay + boost)
//! ```

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Utc};

use crate::config::WeightConfig;
use crate::types::NodeWeight;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Computes and commits cognitive weights.
#[derive(Debug, Clone)]
pub struct WeightModel {
    config: WeightConfig,
}

impl WeightModel {
    pub fn new(config: WeightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Current weight of a node at `now`.
    ///
    /// The result is not clamped to 1; callers committing it into
    /// [`NodeWeight::base`] go through [`NodeWeight::commit`], which clamps.
    pub fn current_weight(&self, weight: &NodeWeight, now: DateTime<Utc>) -> f64 {
        let days = days_between(weight.last_updated, now);
        self.weight_at(weight.base, days, weight.interaction_count, now)
    }

    /// Weight for explicit inputs; `now` only drives the seasonal term.
    pub fn weight_at(
        &self,
        base: f64,
        days_elapsed: f64,
        interaction_count: u32,
        now: DateTime<Utc>,
    ) -> f64 {
        let lambda = self.seasonal_lambda(now);
        let time_decay = self.config.alpha * base * (-lambda * days_elapsed.max(0.0).sqrt()).exp();
        round2(time_decay + self.interaction_boost(interaction_count))
    }

    /// Decay rate for the day of year of `now`.
    pub fn seasonal_lambda(&self, now: DateTime<Utc>) -> f64 {
        let day_of_year = now.ordinal() as f64;
        self.config.decay_lambda
            + self.config.seasonal_amplitude * (2.0 * PI * day_of_year / 365.0).sin()
    }

    /// Saturating boost for `n` interactions; zero when `n == 0`.
    pub fn interaction_boost(&self, n: u32) -> f64 {
        let n = n as f64;
        let beta = self.config.beta_coefficient * (1.0 + 0.5 * ((n - 3.0) / 2.0).tanh());
        beta * (1.0 - 1.0 / (1.0 + (n + 1.0).log2()))
    }

    /// Weight state for a newly observed document.
    ///
    /// Runs the model once over the initial weight so new nodes start from
    /// the same scale as decayed ones.
    pub fn seed(&self, now: DateTime<Utc>) -> NodeWeight {
        let mut weight = NodeWeight::new(self.config.initial_weight, now);
        let seeded = self.current_weight(&weight, now);
        weight.commit(seeded, now);
        weight
    }

    /// Commit the decayed weight and reset the interaction count.
    ///
    /// Re-running at the same instant with no interactions leaves the base
    /// unchanged when `alpha == 1`.
    pub fn apply_daily_decay(&self, weight: &mut NodeWeight, now: DateTime<Utc>) {
        let current = self.current_weight(weight, now);
        weight.commit(current, now);
        weight.interaction_count = 0;
    }
}

impl Default for WeightModel {
    fn default() -> Self {
        Self::new(WeightConfig::default())
    }
}

/// Fractional days from `from` to `to`, never negative.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let ms = to.signed_duration_since(from).num_milliseconds() as f64;
    (ms / MS_PER_DAY).max(0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn flat_model() -> WeightModel {
        WeightModel::new(WeightConfig {
            seasonal_amplitude: 0.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_ten_day_decay_without_interactions() {
        let model = flat_model();
        let now = Utc::now();
        let weight = NodeWeight {
            base: 0.5,
            last_updated: now - Duration::days(10),
            interaction_count: 0,
            previous_engagement: None,
        };

        // 0.5 * exp(-0.05 * sqrt(10)) = 0.4269
        assert_eq!(model.current_weight(&weight, now), 0.43);
    }

    #[test]
    fn test_seasonal_term_stays_within_amplitude() {
        let model = WeightModel::default();
        let now = Utc::now();
        let weight = NodeWeight {
            base: 0.5,
            last_updated: now - Duration::days(10),
            interaction_count: 0,
            previous_engagement: None,
        };
        let w = model.current_weight(&weight, now);
        assert!((0.40..=0.45).contains(&w), "got {}", w);
    }

    #[test]
    fn test_seasonal_lambda_peaks_in_spring() {
        let model = WeightModel::default();
        // Day 91 is about a quarter of the year: sin ≈ 1.
        let spring = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        assert!((model.seasonal_lambda(spring) - 0.06).abs() < 0.001);
    }

    #[test]
    fn test_no_boost_without_interactions() {
        assert_eq!(WeightModel::default().interaction_boost(0), 0.0);
    }

    #[test]
    fn test_boost_saturates() {
        let model = WeightModel::default();
        let b10 = model.interaction_boost(10);
        let b100 = model.interaction_boost(100);
        assert!(b100 > b10);
        assert!(b100 - b10 < 0.05);
        assert!(b100 < model.config().beta_coefficient * 1.5);
    }

    #[test]
    fn test_seed_uses_initial_weight() {
        let model = WeightModel::default();
        let now = Utc::now();
        let weight = model.seed(now);
        assert_eq!(weight.base, 0.5);
        assert_eq!(weight.interaction_count, 0);
        assert_eq!(weight.last_updated, now);
    }

    #[test]
    fn test_daily_decay_commits_and_resets() {
        let model = flat_model();
        let now = Utc::now();
        let mut weight = NodeWeight {
            base: 0.5,
            last_updated: now - Duration::days(10),
            interaction_count: 4,
            previous_engagement: Some(0.3),
        };

        model.apply_daily_decay(&mut weight, now);
        let committed = weight.base;
        assert_eq!(weight.interaction_count, 0);
        assert_eq!(weight.last_updated, now);
        assert_eq!(weight.previous_engagement, Some(0.3));

        model.apply_daily_decay(&mut weight, now);
        assert_eq!(weight.base, committed);
    }

    #[test]
    fn test_days_between_never_negative() {
        let now = Utc::now();
        assert_eq!(days_between(now, now - Duration::days(3)), 0.0);
        assert!((days_between(now - Duration::hours(36), now) - 1.5).abs() < 1e-9);
    }
}
