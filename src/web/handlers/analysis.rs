//! # Analysis Handlers
//!
//! `POST /analyze` and `POST /analyze/batch`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AnalysisResponse, LocationQuery};
use crate::orchestration::BatchReport;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub location: String,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

/// A batch entry: a bare location, or a full request overriding the
/// batch-level radius and categories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchLocation {
    Name(String),
    Query(AnalyzeRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalyzeRequest {
    pub locations: Vec<BatchLocation>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl BatchAnalyzeRequest {
    fn into_queries(self, default_radius: f64) -> Vec<LocationQuery> {
        let radius = self.radius.unwrap_or(default_radius);
        let categories = self.categories;

        self.locations
            .into_iter()
            .map(|entry| match entry {
                BatchLocation::Name(location) => LocationQuery {
                    location,
                    radius,
                    categories: categories.clone(),
                },
                BatchLocation::Query(request) => LocationQuery {
                    location: request.location,
                    radius: request.radius.unwrap_or(radius),
                    categories: request.categories.or_else(|| categories.clone()),
                },
            })
            .collect()
    }
}

/// Analyze one location: POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisResponse>> {
    let Json(request) = payload?;
    debug!(location = %request.location, "Received analysis request");

    let query = LocationQuery {
        location: request.location,
        radius: request.radius.unwrap_or(state.default_radius),
        categories: request.categories,
    };

    let response = state.orchestrator.analyze_query(query).await?;
    Ok(Json(response))
}

/// Analyze up to 50 locations: POST /analyze/batch
pub async fn analyze_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchAnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<BatchReport>> {
    let Json(request) = payload?;
    let max_concurrency = request.max_concurrency;
    let queries = request.into_queries(state.default_radius);
    debug!(batch_size = queries.len(), "Received batch analysis request");

    let report = state
        .batch
        .analyze_batch(queries, max_concurrency)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(report))
}
