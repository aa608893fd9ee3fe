//! # Persistence
//!
//! Best-effort history of completed analyses plus per-metric trend rows.
//! The orchestrator notifies the sink from a detached task after every
//! analysis that produced a composite result; sink failures are logged and
//! never affect the response.
//!
//! Two sinks ship with the crate:
//!
//! - [`SqlitePersistenceSink`] backed by a sqlx connection pool
//! - [`InMemoryPersistenceSink`] for tests and ephemeral deployments

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryPersistenceSink;
pub use sqlite::SqlitePersistenceSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AnalysisRequest, CompositeResult, RequestFingerprint};

/// Metric name for the overall score in trend rows
pub const OVERALL_METRIC: &str = "overall";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Stored record could not be decoded: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(error: sqlx::Error) -> Self {
        PersistenceError::Database(error.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::Decode(error.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Request-side details stored alongside a composite result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub analysis_id: Uuid,
    pub fingerprint: RequestFingerprint,
    pub display_location: String,
    pub categories: Option<Vec<String>>,
    pub elapsed_ms: u64,
}

impl RequestMetadata {
    pub fn from_request(analysis_id: Uuid, request: &AnalysisRequest, elapsed_ms: u64) -> Self {
        Self {
            analysis_id,
            fingerprint: request.fingerprint(),
            display_location: request.display_location().to_string(),
            categories: request
                .categories()
                .map(|set| set.iter().cloned().collect()),
            elapsed_ms,
        }
    }
}

/// One stored analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub analysis_id: Uuid,
    pub fingerprint: String,
    pub location: String,
    pub display_location: String,
    pub radius: f64,
    pub overall_score: f64,
    pub partial: bool,
    pub elapsed_ms: u64,
    pub result: CompositeResult,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub metric: String,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceStats {
    pub total_analyses: u64,
    pub complete_analyses: u64,
    pub partial_analyses: u64,
    pub unique_locations: u64,
    /// Mean overall score, rounded to two decimals. `None` when empty.
    pub average_score: Option<f64>,
}

/// Trend rows written for one result: `overall` plus every category score
pub(crate) fn trend_rows(result: &CompositeResult) -> Vec<(String, f64)> {
    std::iter::once((OVERALL_METRIC.to_string(), result.overall_score))
        .chain(
            result
                .category_scores
                .iter()
                .map(|(category, score)| (category.clone(), score.score)),
        )
        .collect()
}

/// Storage for analysis history and trends
#[async_trait]
pub trait PersistenceSink: Send + Sync + fmt::Debug {
    /// Store a completed analysis and its trend rows, returning the record id
    async fn save(
        &self,
        result: &CompositeResult,
        metadata: &RequestMetadata,
    ) -> PersistenceResult<i64>;

    async fn get(&self, id: i64) -> PersistenceResult<Option<AnalysisRecord>>;

    /// Most recent analyses of a location, newest first
    async fn query_by_location(
        &self,
        location: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<AnalysisRecord>>;

    /// Trend rows of one metric for a location since `since`, oldest first
    async fn query_trend(
        &self,
        location: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>>;

    /// Most recent analyses across all locations, newest first
    async fn recent(&self, limit: usize) -> PersistenceResult<Vec<AnalysisRecord>>;

    async fn statistics(&self) -> PersistenceResult<PersistenceStats>;

    /// Delete analyses and trend rows older than `days`, returning the
    /// number of analyses removed
    async fn prune_older_than(&self, days: u32) -> PersistenceResult<u64>;

    fn backend_name(&self) -> &'static str;
}
