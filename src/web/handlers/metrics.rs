//! # Metrics Handler

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::orchestration::EngineMetricsSnapshot;
use crate::resilience::SystemCircuitBreakerMetrics;
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub engine: EngineMetricsSnapshot,
    pub circuit_breakers: SystemCircuitBreakerMetrics,
    pub cache: CacheStats,
}

/// Engine, breaker and cache metrics: GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let orchestrator = &state.orchestrator;
    Json(MetricsResponse {
        engine: orchestrator.metrics().snapshot(),
        circuit_breakers: orchestrator.circuit_breakers().get_system_metrics(),
        cache: orchestrator.cache().stats().await,
    })
}
