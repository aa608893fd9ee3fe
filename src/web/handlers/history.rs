//! # History Handlers
//!
//! Read-only views over the persistence sink. Every route answers 404
//! `PERSISTENCE_DISABLED` when no sink is configured.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::normalize_location;
use crate::persistence::{
    AnalysisRecord, PersistenceSink, PersistenceStats, TrendPoint, OVERALL_METRIC,
};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;
const DEFAULT_TREND_DAYS: u32 = 30;
const MAX_TREND_DAYS: u32 = 365;

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryParams {
    pub location: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendParams {
    pub location: String,
    pub metric: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub location: String,
    pub count: usize,
    pub records: Vec<AnalysisRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendResponse {
    pub location: String,
    pub metric: String,
    pub days: u32,
    pub points: Vec<TrendPoint>,
}

fn require_sink(state: &AppState) -> ApiResult<&Arc<dyn PersistenceSink>> {
    state
        .persistence
        .as_ref()
        .ok_or(ApiError::PersistenceDisabled)
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn require_location(location: &str) -> ApiResult<String> {
    let normalized = normalize_location(location);
    if normalized.is_empty() {
        return Err(ApiError::bad_request("location must not be empty"));
    }
    Ok(normalized)
}

/// Past analyses of one location: GET /history
pub async fn location_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    let Query(params) = params?;
    let sink = require_sink(&state)?;
    let location = require_location(&params.location)?;

    let records = sink
        .query_by_location(&location, clamp_limit(params.limit))
        .await?;

    Ok(Json(HistoryResponse {
        location,
        count: records.len(),
        records,
    }))
}

/// Score trend of one metric for a location: GET /trend
pub async fn location_trend(
    State(state): State<AppState>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> ApiResult<Json<TrendResponse>> {
    let Query(params) = params?;
    let sink = require_sink(&state)?;
    let location = require_location(&params.location)?;
    let metric = params
        .metric
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| OVERALL_METRIC.to_string());
    let days = params
        .days
        .unwrap_or(DEFAULT_TREND_DAYS)
        .clamp(1, MAX_TREND_DAYS);

    let since = Utc::now() - ChronoDuration::days(i64::from(days));
    let points = sink.query_trend(&location, &metric, since).await?;

    Ok(Json(TrendResponse {
        location,
        metric,
        days,
        points,
    }))
}

/// Latest analyses across all locations: GET /history/recent
pub async fn recent_history(
    State(state): State<AppState>,
    params: Result<Query<RecentParams>, QueryRejection>,
) -> ApiResult<Json<Vec<AnalysisRecord>>> {
    let Query(params) = params?;
    let records = require_sink(&state)?.recent(clamp_limit(params.limit)).await?;
    Ok(Json(records))
}

/// Aggregate history statistics: GET /history/statistics
pub async fn history_statistics(
    State(state): State<AppState>,
) -> ApiResult<Json<PersistenceStats>> {
    let stats = require_sink(&state)?.statistics().await?;
    Ok(Json(stats))
}
