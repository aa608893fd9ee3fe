//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::web::state::AppState;

/// Engine error rate above which the service reports itself degraded
const DEGRADED_ERROR_RATE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unhealthy`
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: i64,
    pub collectors: usize,
    pub cache_backend: String,
    pub persistence_enabled: bool,
    pub open_circuits: Vec<String>,
    pub circuit_health_score: f64,
    pub error_rate: f64,
}

/// Service health: GET /health
///
/// Always answers 200; the `status` field carries the verdict.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let breakers = orchestrator.circuit_breakers();
    let cache_stats = orchestrator.cache().stats().await;
    let open_circuits = breakers.open_circuits();
    let error_rate = orchestrator.metrics().error_rate();
    let collectors = orchestrator.collectors().len();

    let durable_down =
        cache_stats.durable_provider.is_some() && cache_stats.backend != "durable";
    let status = if collectors == 0 {
        "unhealthy"
    } else if !open_circuits.is_empty() || durable_down || error_rate > DEGRADED_ERROR_RATE {
        "degraded"
    } else {
        "healthy"
    };

    let now = chrono::Utc::now();
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: now.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        uptime_seconds: (now - state.started_at).num_seconds(),
        collectors,
        cache_backend: cache_stats.backend,
        persistence_enabled: state.persistence.is_some(),
        open_circuits,
        circuit_health_score: breakers.system_health_score(),
        error_rate,
    })
}
