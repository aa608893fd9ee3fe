//! Property-based tests for fingerprinting and score aggregation

use proptest::prelude::*;
use std::time::Duration;

use sitescore_core::config::ScoringConfig;
use sitescore_core::models::{AnalysisRequest, CategoryOutcome, CollectorOutcome, CollectorResult};
use sitescore_core::orchestration::aggregator::renormalize;
use sitescore_core::orchestration::ScoreAggregator;

fn location_words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9,]{1,10}", 1..6)
}

fn whitespace() -> impl Strategy<Value = String> {
    "[ \t]{1,4}"
}

proptest! {
    #[test]
    fn fingerprint_ignores_case_and_whitespace(
        words in location_words(),
        gaps in prop::collection::vec(whitespace(), 7),
        radius in 0.1f64..100.0,
    ) {
        let canonical = words.join(" ");
        let mut noisy = gaps[0].clone();
        for (i, word) in words.iter().enumerate() {
            if i % 2 == 0 {
                noisy.push_str(&word.to_uppercase());
            } else {
                noisy.push_str(&word.to_lowercase());
            }
            noisy.push_str(&gaps[i + 1]);
        }

        let a = AnalysisRequest::new(&canonical, radius, None).unwrap();
        let b = AnalysisRequest::new(&noisy, radius, None).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a.location(), b.location());
    }

    #[test]
    fn fingerprint_separates_different_radii(
        words in location_words(),
        radius in 1.0f64..50.0,
    ) {
        let location = words.join(" ");
        let a = AnalysisRequest::new(&location, radius, None).unwrap();
        let b = AnalysisRequest::new(&location, radius + 0.5, None).unwrap();
        prop_assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn renormalized_weights_sum_to_one(weights in prop::collection::vec(0.0f64..10.0, 1..12)) {
        let normalized = renormalize(&weights);
        prop_assert_eq!(normalized.len(), weights.len());
        let total: f64 = normalized.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(normalized.iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn overall_score_lies_between_category_scores(
        scores in prop::collection::vec(0.0f64..=100.0, 1..8),
    ) {
        let request = AnalysisRequest::new("Austin, TX", 2.0, None).unwrap();
        let outcomes: Vec<CategoryOutcome> = scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                let category = format!("category_{i}");
                CategoryOutcome::new(
                    category.clone(),
                    CollectorOutcome::Succeeded(CollectorResult::new(category, *score)),
                    Duration::from_millis(1),
                )
            })
            .collect();

        let result = ScoreAggregator::new(ScoringConfig::default())
            .aggregate(&request, &outcomes)
            .unwrap();

        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        // two-decimal rounding may move the score by at most 0.005
        prop_assert!(result.overall_score >= min - 0.005);
        prop_assert!(result.overall_score <= max + 0.005);
        prop_assert!(result.missing.is_empty());
        prop_assert_eq!(result.succeeded.len(), scores.len());
    }

    #[test]
    fn failed_categories_are_always_reported_missing(
        outcomes in prop::collection::vec(prop::option::of(0.0f64..=100.0), 1..8),
    ) {
        let request = AnalysisRequest::new("Austin, TX", 2.0, None).unwrap();
        let category_outcomes: Vec<CategoryOutcome> = outcomes
            .iter()
            .enumerate()
            .map(|(i, score)| {
                let category = format!("category_{i}");
                let outcome = match score {
                    Some(score) => CollectorOutcome::Succeeded(CollectorResult::new(category.clone(), *score)),
                    None => CollectorOutcome::TimedOut,
                };
                CategoryOutcome::new(category, outcome, Duration::from_millis(1))
            })
            .collect();

        let failures = outcomes.iter().filter(|o| o.is_none()).count();
        match ScoreAggregator::new(ScoringConfig::default()).aggregate(&request, &category_outcomes) {
            Ok(result) => {
                prop_assert_eq!(result.missing.len(), failures);
                prop_assert_eq!(result.succeeded.len() + result.missing.len(), outcomes.len());
                prop_assert_eq!(result.partial, failures > 0 || result.succeeded.len() < 3);
            }
            Err(_) => prop_assert_eq!(failures, outcomes.len()),
        }
    }
}
