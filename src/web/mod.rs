//! # Web API Module
//!
//! Axum-based REST API over the aggregation engine.
//!
//! ## Core Components
//!
//! - [`routes`] - HTTP route definitions grouped by endpoint family
//! - [`handlers`] - Request handlers
//! - [`state`] - Shared application state
//! - [`errors`] - JSON error responses

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = Duration::from_millis(app_state.config.request_timeout_ms);
    let cors_enabled = app_state.config.cors_enabled;

    let router = Router::new()
        .merge(routes::health_routes())
        .merge(routes::analysis_routes())
        .merge(routes::admin_routes())
        .merge(routes::history_routes())
        .layer(TimeoutLayer::new(request_timeout));

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
