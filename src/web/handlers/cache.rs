//! # Cache Handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub cleared: u64,
}

/// Cache statistics: GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache().stats().await)
}

/// Drop every cached result: POST /cache/clear
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearResponse> {
    let cleared = state.orchestrator.cache().clear().await;
    Json(CacheClearResponse { cleared })
}
