use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::collectors::CollectorError;

/// Data-quality tag a collector attaches to its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        f.write_str(s)
    }
}

/// One collector invocation's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorResult {
    pub category: String,
    /// Category score on a 0-100 scale
    pub score: f64,
    pub metrics: BTreeMap<String, f64>,
    pub confidence: Confidence,
    pub elapsed_ms: u64,
    pub success: bool,
}

impl CollectorResult {
    pub fn new(category: impl Into<String>, score: f64) -> Self {
        Self {
            category: category.into(),
            score,
            metrics: BTreeMap::new(),
            confidence: Confidence::default(),
            elapsed_ms: 0,
            success: true,
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn failed(category: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::new(category, 0.0)
        }
    }
}

/// How a single collector invocation settled
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorOutcome {
    Succeeded(CollectorResult),
    /// Per-call timeout or the request deadline elapsed first
    TimedOut,
    /// Short-circuited by an open breaker; the collector was not called
    Rejected,
    Failed(CollectorError),
}

impl CollectorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CollectorOutcome::Succeeded(_))
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            CollectorOutcome::Succeeded(_) => OutcomeStatus::Succeeded,
            CollectorOutcome::TimedOut => OutcomeStatus::TimedOut,
            CollectorOutcome::Rejected => OutcomeStatus::Rejected,
            CollectorOutcome::Failed(_) => OutcomeStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    TimedOut,
    Rejected,
    Failed,
}

/// A settled outcome tagged with the category it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub category: String,
    pub outcome: CollectorOutcome,
    pub elapsed: Duration,
}

impl CategoryOutcome {
    pub fn new(category: impl Into<String>, outcome: CollectorOutcome, elapsed: Duration) -> Self {
        Self {
            category: category.into(),
            outcome,
            elapsed,
        }
    }

    pub fn report(&self) -> CollectorReport {
        CollectorReport {
            category: self.category.clone(),
            status: self.outcome.status(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            error: match &self.outcome {
                CollectorOutcome::Failed(e) => Some(e.to_string()),
                CollectorOutcome::TimedOut => Some("timed out".to_string()),
                CollectorOutcome::Rejected => Some("circuit breaker open".to_string()),
                CollectorOutcome::Succeeded(_) => None,
            },
        }
    }
}

/// Per-collector line in an analysis response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorReport {
    pub category: String,
    pub status: OutcomeStatus,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
