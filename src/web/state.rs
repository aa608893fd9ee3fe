//! # Web Application State
//!
//! Shared state handed to every axum handler. Cloning is cheap; every
//! component sits behind an `Arc`.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{SiteScoreConfig, WebConfig};
use crate::orchestration::{BatchCoordinator, Orchestrator};
use crate::persistence::PersistenceSink;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub batch: Arc<BatchCoordinator>,
    pub persistence: Option<Arc<dyn PersistenceSink>>,
    /// Radius applied when a request omits one
    pub default_radius: f64,
    pub environment: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &SiteScoreConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config: Arc::new(config.web.clone()),
            batch: Arc::new(BatchCoordinator::new(
                Arc::clone(&orchestrator),
                config.batch.clone(),
            )),
            persistence: orchestrator.persistence().cloned(),
            default_radius: config.orchestrator.default_radius,
            environment: config.environment.clone(),
            started_at: Utc::now(),
            orchestrator,
        }
    }
}
