//! # Circuit Breaker Handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::resilience::CircuitBreakerStatus;
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakersResponse {
    pub enabled: bool,
    pub health_score: f64,
    pub open_circuits: Vec<String>,
    pub circuit_breakers: Vec<CircuitBreakerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerResetResponse {
    pub reset: usize,
}

/// Every collector breaker: GET /circuit-breakers
pub async fn list_circuit_breakers(State(state): State<AppState>) -> Json<CircuitBreakersResponse> {
    let manager = state.orchestrator.circuit_breakers();
    Json(CircuitBreakersResponse {
        enabled: manager.is_enabled(),
        health_score: manager.system_health_score(),
        open_circuits: manager.open_circuits(),
        circuit_breakers: manager.statuses(),
    })
}

/// Close every breaker and clear its counters: POST /circuit-breakers/reset
pub async fn reset_circuit_breakers(
    State(state): State<AppState>,
) -> Json<CircuitBreakerResetResponse> {
    let reset = state.orchestrator.circuit_breakers().reset_all();
    info!(reset = reset, "Circuit breakers reset via API");
    Json(CircuitBreakerResetResponse { reset })
}
