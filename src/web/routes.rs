//! # Web API Route Definitions

use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Analysis endpoints
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(handlers::analysis::analyze))
        .route("/analyze/batch", post(handlers::analysis::analyze_batch))
}

/// Cache and circuit breaker administration
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(handlers::cache::cache_stats))
        .route("/cache/clear", post(handlers::cache::clear_cache))
        .route(
            "/circuit-breakers",
            get(handlers::circuit_breakers::list_circuit_breakers),
        )
        .route(
            "/circuit-breakers/reset",
            post(handlers::circuit_breakers::reset_circuit_breakers),
        )
}

/// History and trend queries over the persistence sink
pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(handlers::history::location_history))
        .route("/history/recent", get(handlers::history::recent_history))
        .route(
            "/history/statistics",
            get(handlers::history::history_statistics),
        )
        .route("/trend", get(handlers::history::location_trend))
}

/// Health and metrics
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::metrics))
}
