//! # Score Aggregator
//!
//! Merges settled collector outcomes into a [`CompositeResult`]. Only
//! categories that succeeded contribute; their base weights are
//! renormalized so the overall score stays on the 0-100 scale no matter
//! which subset answered.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::error::{AggregatorError, AggregatorResult};
use crate::models::{
    AnalysisRequest, CategoryOutcome, CategoryScore, CollectorOutcome, CompositeResult,
    Recommendation, ScoreConfidence,
};

#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    config: ScoringConfig,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Configured base weight for `category`, or the default weight
    pub fn weight_for(&self, category: &str) -> f64 {
        self.config
            .weights
            .get(category)
            .copied()
            .unwrap_or(self.config.default_weight)
    }

    /// Weighted composite over the outcomes that succeeded
    ///
    /// Returns `AggregateUnavailable` when nothing succeeded.
    pub fn aggregate(
        &self,
        request: &AnalysisRequest,
        outcomes: &[CategoryOutcome],
    ) -> AggregatorResult<CompositeResult> {
        let mut succeeded = Vec::new();
        let mut missing = Vec::new();
        let mut contributions = Vec::new();

        for outcome in outcomes {
            match &outcome.outcome {
                CollectorOutcome::Succeeded(result) if result.score.is_finite() => {
                    succeeded.push(outcome.category.clone());
                    contributions.push((outcome.category.as_str(), result));
                }
                _ => missing.push(outcome.category.clone()),
            }
        }

        if contributions.is_empty() {
            return Err(AggregatorError::AggregateUnavailable {
                attempted: outcomes.len(),
                missing,
            });
        }

        let base_weights: Vec<f64> = contributions
            .iter()
            .map(|(category, _)| self.weight_for(category).max(0.0))
            .collect();
        let effective_weights = renormalize(&base_weights);

        let mut overall = 0.0;
        let mut category_scores = BTreeMap::new();
        for (((category, result), weight), effective_weight) in contributions
            .iter()
            .zip(&base_weights)
            .zip(&effective_weights)
        {
            let score = result.score.clamp(0.0, 100.0);
            overall += score * effective_weight;
            category_scores.insert(
                (*category).to_string(),
                CategoryScore {
                    score,
                    weight: *weight,
                    effective_weight: *effective_weight,
                    confidence: result.confidence,
                    metrics: result.metrics.clone(),
                },
            );
        }

        let overall_score = round_score(overall.clamp(0.0, 100.0));
        let below_minimum = succeeded.len() < self.config.min_categories;
        let confidence = if below_minimum {
            ScoreConfidence::Low
        } else if missing.is_empty() {
            ScoreConfidence::High
        } else {
            ScoreConfidence::Medium
        };

        debug!(
            overall_score = overall_score,
            succeeded = succeeded.len(),
            missing = missing.len(),
            confidence = ?confidence,
            "Aggregated collector outcomes"
        );

        Ok(CompositeResult {
            location: request.location().to_string(),
            radius: request.radius(),
            overall_score,
            category_scores,
            partial: below_minimum || !missing.is_empty(),
            succeeded,
            missing,
            confidence,
            recommendation: Recommendation::from_score(overall_score, &self.config.thresholds),
            computed_at: Utc::now(),
        })
    }
}

/// Scale weights to sum to 1. All-zero input falls back to equal weights.
pub fn renormalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        let equal = 1.0 / weights.len().max(1) as f64;
        return vec![equal; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

/// Round to two decimal places
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::CollectorError;
    use crate::models::CollectorResult;
    use std::collections::HashMap;
    use std::time::Duration;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("Austin, TX", 2.0, None).unwrap()
    }

    fn ok(category: &str, score: f64) -> CategoryOutcome {
        CategoryOutcome::new(
            category,
            CollectorOutcome::Succeeded(CollectorResult::new(category, score)),
            Duration::from_millis(5),
        )
    }

    fn failed(category: &str) -> CategoryOutcome {
        CategoryOutcome::new(
            category,
            CollectorOutcome::Failed(CollectorError::Upstream("boom".to_string())),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_equal_weights_full_success() {
        let aggregator = ScoreAggregator::new(ScoringConfig::default());
        let outcomes: Vec<_> = [80.0, 70.0, 90.0, 60.0, 75.0, 85.0]
            .iter()
            .enumerate()
            .map(|(i, s)| ok(&format!("category_{}", i + 1), *s))
            .collect();

        let result = aggregator.aggregate(&request(), &outcomes).unwrap();
        assert_eq!(result.overall_score, 76.67);
        assert!(!result.partial);
        assert_eq!(result.confidence, ScoreConfidence::High);
        assert_eq!(result.recommendation, Recommendation::Good);
        assert_eq!(result.succeeded.len(), 6);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_missing_category_renormalizes() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.5);
        weights.insert("b".to_string(), 0.25);
        weights.insert("c".to_string(), 0.25);
        let aggregator = ScoreAggregator::new(ScoringConfig {
            weights,
            min_categories: 2,
            ..ScoringConfig::default()
        });

        let result = aggregator
            .aggregate(&request(), &[ok("a", 90.0), ok("b", 60.0), failed("c")])
            .unwrap();

        // 90 * 2/3 + 60 * 1/3
        assert_eq!(result.overall_score, 80.0);
        assert!(result.partial);
        assert_eq!(result.confidence, ScoreConfidence::Medium);
        assert_eq!(result.missing, vec!["c".to_string()]);
        let a = &result.category_scores["a"];
        assert!((a.effective_weight - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(a.weight, 0.5);
    }

    #[test]
    fn test_below_minimum_is_low_confidence() {
        let aggregator = ScoreAggregator::new(ScoringConfig::default());
        let result = aggregator
            .aggregate(&request(), &[ok("a", 40.0), ok("b", 60.0)])
            .unwrap();

        assert!(result.partial);
        assert_eq!(result.confidence, ScoreConfidence::Low);
        assert_eq!(result.overall_score, 50.0);
    }

    #[test]
    fn test_zero_weights_fall_back_to_equal() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.0);
        weights.insert("b".to_string(), 0.0);
        let aggregator = ScoreAggregator::new(ScoringConfig {
            weights,
            min_categories: 1,
            ..ScoringConfig::default()
        });

        let result = aggregator
            .aggregate(&request(), &[ok("a", 20.0), ok("b", 40.0)])
            .unwrap();
        assert_eq!(result.overall_score, 30.0);
    }

    #[test]
    fn test_scores_are_clamped() {
        let aggregator = ScoreAggregator::new(ScoringConfig {
            min_categories: 1,
            ..ScoringConfig::default()
        });
        let result = aggregator
            .aggregate(&request(), &[ok("a", 140.0), ok("b", -20.0)])
            .unwrap();

        assert_eq!(result.category_scores["a"].score, 100.0);
        assert_eq!(result.category_scores["b"].score, 0.0);
        assert_eq!(result.overall_score, 50.0);
    }

    #[test]
    fn test_nothing_succeeded() {
        let aggregator = ScoreAggregator::new(ScoringConfig::default());
        let outcomes = vec![
            failed("a"),
            CategoryOutcome::new("b", CollectorOutcome::TimedOut, Duration::from_secs(1)),
            CategoryOutcome::new("c", CollectorOutcome::Rejected, Duration::ZERO),
        ];

        match aggregator.aggregate(&request(), &outcomes) {
            Err(AggregatorError::AggregateUnavailable { attempted, missing }) => {
                assert_eq!(attempted, 3);
                assert_eq!(missing, vec!["a", "b", "c"]);
            }
            other => panic!("expected AggregateUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_renormalize_sums_to_one() {
        let weights = renormalize(&[0.2, 0.3, 0.1]);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(renormalize(&[0.0, 0.0]), vec![0.5, 0.5]);
    }
}
