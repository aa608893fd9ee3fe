use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::collector_result::{CollectorReport, Confidence};
use super::fingerprint::RequestFingerprint;
use crate::config::RecommendationThresholds;

/// How much the overall score can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreConfidence {
    /// Every requested category contributed
    High,
    /// Some categories missing but the minimum was met
    Medium,
    /// Fewer categories than the configured minimum
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Excellent,
    Good,
    Moderate,
    Poor,
    NotRecommended,
}

impl Recommendation {
    pub fn from_score(score: f64, thresholds: &RecommendationThresholds) -> Self {
        if score >= thresholds.excellent {
            Recommendation::Excellent
        } else if score >= thresholds.good {
            Recommendation::Good
        } else if score >= thresholds.moderate {
            Recommendation::Moderate
        } else if score >= thresholds.poor {
            Recommendation::Poor
        } else {
            Recommendation::NotRecommended
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Excellent => "Excellent",
            Recommendation::Good => "Good",
            Recommendation::Moderate => "Moderate",
            Recommendation::Poor => "Poor",
            Recommendation::NotRecommended => "Not Recommended",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    /// Configured base weight
    pub weight: f64,
    /// Weight after renormalization over the categories that succeeded
    pub effective_weight: f64,
    pub confidence: Confidence,
    pub metrics: BTreeMap<String, f64>,
}

/// Merged output of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    /// Normalized location the score was computed for
    pub location: String,
    pub radius: f64,
    pub overall_score: f64,
    pub category_scores: BTreeMap<String, CategoryScore>,
    pub succeeded: Vec<String>,
    pub missing: Vec<String>,
    pub partial: bool,
    pub confidence: ScoreConfidence,
    pub recommendation: Recommendation,
    pub computed_at: DateTime<Utc>,
}

/// What `analyze` hands back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Unique per call, including cache hits
    pub analysis_id: Uuid,
    pub location: String,
    pub radius: f64,
    pub fingerprint: RequestFingerprint,
    pub result: CompositeResult,
    pub cached: bool,
    pub partial: bool,
    pub elapsed_ms: u64,
    /// Empty for cache hits
    pub collectors: Vec<CollectorReport>,
}
