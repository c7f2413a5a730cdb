use chrono::{TimeZone, Utc};
use noesis_core::cognitive::{easiness, CentralityEngine, MIN_COMPLEXITY};
use noesis_core::config::{CentralityConfig, WeightConfig};
use noesis_core::{ReviewIntervalPolicy, TextComplexityAnalyzer, WeightModel};
use proptest::prelude::*;

fn arb_policy() -> impl Strategy<Value = ReviewIntervalPolicy> {
    prop_oneof![
        Just(ReviewIntervalPolicy::Linear),
        Just(ReviewIntervalPolicy::Exponential),
    ]
}

proptest! {
    #[test]
    fn complexity_stays_in_range(text in "\\PC{0,400}") {
        let score = TextComplexityAnalyzer::new().complexity(&text);
        prop_assert!((MIN_COMPLEXITY..=1.0).contains(&score), "score {}", score);
    }

    #[test]
    fn weight_never_grows_with_time(
        base in 0.0f64..=1.0,
        days in 0.0f64..365.0,
        extra in 0.0f64..365.0,
        interactions in 0u32..50,
    ) {
        let model = WeightModel::new(WeightConfig::default());
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let earlier = model.weight_at(base, days, interactions, now);
        let later = model.weight_at(base, days + extra, interactions, now);
        prop_assert!(later <= earlier);
    }

    #[test]
    fn interactions_never_lower_weight(
        base in 0.0f64..=1.0,
        days in 0.0f64..365.0,
        n in 0u32..100,
    ) {
        let model = WeightModel::new(WeightConfig::default());
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        prop_assert!(model.weight_at(base, days, n + 1, now) >= model.weight_at(base, days, n, now));
    }

    #[test]
    fn easiness_is_bounded(rate in 0.0f64..=1.0) {
        let ef = easiness(rate);
        prop_assert!((1.3..=2.5).contains(&ef));
    }

    #[test]
    fn interval_is_clamped(weight in -1.0f64..2.0, max in 1u32..365, policy in arb_policy()) {
        let days = policy.interval_days(weight, max);
        prop_assert!(days >= 1 && days <= max);
    }

    #[test]
    fn centrality_is_a_distribution(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..30),
    ) {
        let ids: Vec<String> = (0..8).map(|i| format!("n{}", i)).collect();
        let links: Vec<(String, Vec<String>)> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let targets = edges
                    .iter()
                    .filter(|(from, to)| *from == i && from != to)
                    .map(|(_, to)| ids[*to].clone())
                    .collect();
                (id.clone(), targets)
            })
            .collect();

        let scores = CentralityEngine::new(CentralityConfig::default()).centrality(
            links
                .iter()
                .map(|(id, targets)| (id.as_str(), targets.iter().map(String::as_str))),
        );

        prop_assert_eq!(scores.len(), 8);
        for (_, score) in scores.iter() {
            prop_assert!(*score >= 0.0);
        }
    }
}
