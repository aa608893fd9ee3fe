//! # Batch Coordinator
//!
//! Runs many location queries through one [`Orchestrator`] with a shared
//! concurrency cap. Every item runs in its own task, so a failing or
//! panicking item only turns its own entry into an error. Output order
//! always matches input order.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use super::orchestrator::Orchestrator;
use crate::config::{BatchConfig, MAX_BATCH_SIZE};
use crate::error::{AggregatorError, AggregatorResult};
use crate::models::{AnalysisResponse, LocationQuery};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub code: String,
    pub message: String,
}

impl From<&AggregatorError> for BatchItemError {
    fn from(error: &AggregatorError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Outcome for one input of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position in the input list
    pub index: usize,
    pub location: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

impl BatchItemResult {
    fn from_outcome(index: usize, location: String, outcome: AggregatorResult<AnalysisResponse>) -> Self {
        match outcome {
            Ok(response) => Self {
                index,
                location,
                success: true,
                result: Some(response),
                error: None,
            },
            Err(error) => Self {
                index,
                location,
                success: false,
                result: None,
                error: Some(BatchItemError::from(&error)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub items: Vec<BatchItemResult>,
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    orchestrator: Arc<Orchestrator>,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(orchestrator: Arc<Orchestrator>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Largest batch accepted, never above the hard limit of 50
    pub fn max_batch_size(&self) -> usize {
        self.config.max_batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Effective number of items analysed at once
    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        let max = self.config.max_concurrency.max(1);
        requested
            .unwrap_or(self.config.default_concurrency)
            .clamp(1, max)
    }

    /// Analyse every query, returning one entry per input in input order
    ///
    /// Only an empty or oversized batch fails as a whole.
    #[instrument(skip(self, queries), fields(batch_size = queries.len()))]
    pub async fn analyze_batch(
        &self,
        queries: Vec<LocationQuery>,
        max_concurrency: Option<usize>,
    ) -> AggregatorResult<BatchReport> {
        if queries.is_empty() {
            return Err(AggregatorError::invalid_request(
                "batch must contain at least one location",
            ));
        }
        let max_batch_size = self.max_batch_size();
        if queries.len() > max_batch_size {
            return Err(AggregatorError::invalid_request(format!(
                "batch of {} exceeds the maximum of {max_batch_size} locations",
                queries.len()
            )));
        }

        let started = Instant::now();
        let total = queries.len();
        let concurrency = self.effective_concurrency(max_concurrency);

        info!(total = total, concurrency = concurrency, "Starting batch analysis");

        let items: Vec<BatchItemResult> = stream::iter(queries.into_iter().enumerate())
            .map(|(index, query)| {
                let orchestrator = Arc::clone(&self.orchestrator);
                let location = query.location.clone();
                let handle = tokio::spawn(async move { orchestrator.analyze_query(query).await });
                async move {
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            warn!(index = index, error = %join_error, "Batch item task failed");
                            Err(AggregatorError::from(join_error))
                        }
                    };
                    BatchItemResult::from_outcome(index, location, outcome)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let succeeded = items.iter().filter(|item| item.success).count();
        let report = BatchReport {
            total,
            succeeded,
            failed: total - succeeded,
            elapsed_ms: started.elapsed().as_millis() as u64,
            items,
        };

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed_ms,
            "Batch analysis completed"
        );

        Ok(report)
    }
}
