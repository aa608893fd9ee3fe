//! # Configuration
//!
//! Layered configuration for the aggregation engine. Values come from
//! built-in defaults, an optional TOML file and `SITESCORE__*` environment
//! overrides, in that order (see [`loader::ConfigLoader`]).
//!
//! ```toml
//! environment = "production"
//!
//! [orchestrator]
//! max_concurrent_collectors = 32
//! collector_timeout_ms = 8000
//! request_deadline_ms = 20000
//!
//! [scoring]
//! min_categories = 3
//! [scoring.weights]
//! demographics = 0.25
//! competition = 0.20
//!
//! [[collectors]]
//! category = "demographics"
//! url = "http://demographics.internal/score"
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod loader;

pub use cache::{CacheConfig, RedisConfig};
pub use circuit_breaker::{CircuitBreakerComponentConfig, CircuitBreakerConfig};
pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Hard ceiling on batch size regardless of configuration
pub const MAX_BATCH_SIZE: usize = 50;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteScoreConfig {
    pub environment: String,
    pub web: WebConfig,
    pub orchestrator: OrchestratorConfig,
    pub batch: BatchConfig,
    pub circuit_breakers: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub persistence: PersistenceConfig,
    pub collectors: Vec<HttpCollectorConfig>,
}

impl Default for SiteScoreConfig {
    fn default() -> Self {
        Self {
            environment: loader::detect_environment(),
            web: WebConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            batch: BatchConfig::default(),
            circuit_breakers: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            scoring: ScoringConfig::default(),
            persistence: PersistenceConfig::default(),
            collectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub request_timeout_ms: u64,
    pub cors_enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 60_000,
            cors_enabled: true,
        }
    }
}

/// Fan-out execution policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Global worker limit shared by every in-flight request
    pub max_concurrent_collectors: usize,

    /// Per-call timeout applied to each collector invocation
    pub collector_timeout_ms: u64,

    /// Deadline for the whole fan-out of one request
    pub request_deadline_ms: u64,

    pub default_radius: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_collectors: 16,
            collector_timeout_ms: 10_000,
            request_deadline_ms: 30_000,
            default_radius: 2.0,
        }
    }
}

impl OrchestratorConfig {
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    /// Items analysed at once when the caller does not say
    pub default_concurrency: usize,
    /// Upper clamp for a caller-supplied concurrency
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_SIZE,
            default_concurrency: 10,
            max_concurrency: 20,
        }
    }
}

/// Weighting and qualification policy for composite scores
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Base weight per category
    pub weights: HashMap<String, f64>,

    /// Weight for categories missing from `weights`
    pub default_weight: f64,

    /// Fewer successful categories than this flags the result as partial
    pub min_categories: usize,

    /// Reject weight tables that do not sum to 1
    pub require_normalized_weights: bool,

    pub thresholds: RecommendationThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: 1.0,
            min_categories: 3,
            require_normalized_weights: false,
            thresholds: RecommendationThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    pub excellent: f64,
    pub good: f64,
    pub moderate: f64,
    pub poor: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 65.0,
            moderate: 50.0,
            poor: 35.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: "sqlite://sitescore.db".to_string(),
            max_connections: 5,
        }
    }
}

/// A collector that posts the request to a URL and reads back a score
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpCollectorConfig {
    pub category: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl SiteScoreConfig {
    /// Validate configuration values that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        let orch = &self.orchestrator;
        if orch.max_concurrent_collectors == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.max_concurrent_collectors",
                orch.max_concurrent_collectors,
                "must be greater than 0",
            ));
        }
        if orch.collector_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.collector_timeout_ms",
                orch.collector_timeout_ms,
                "must be greater than 0",
            ));
        }
        if orch.collector_timeout_ms > orch.request_deadline_ms {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.collector_timeout_ms",
                orch.collector_timeout_ms,
                format!(
                    "must not exceed request_deadline_ms ({})",
                    orch.request_deadline_ms
                ),
            ));
        }
        if !(orch.default_radius.is_finite() && orch.default_radius > 0.0) {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.default_radius",
                orch.default_radius,
                "must be a positive number",
            ));
        }

        if self.batch.max_batch_size == 0 || self.batch.max_batch_size > MAX_BATCH_SIZE {
            return Err(ConfigurationError::invalid_value(
                "batch.max_batch_size",
                self.batch.max_batch_size,
                format!("must be between 1 and {MAX_BATCH_SIZE}"),
            ));
        }
        if self.batch.default_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.default_concurrency",
                self.batch.default_concurrency,
                "must be greater than 0",
            ));
        }
        if self.batch.max_concurrency < self.batch.default_concurrency {
            return Err(ConfigurationError::invalid_value(
                "batch.max_concurrency",
                self.batch.max_concurrency,
                "must be at least batch.default_concurrency",
            ));
        }

        let breakers = std::iter::once(("default", &self.circuit_breakers.default_config)).chain(
            self.circuit_breakers
                .component_configs
                .iter()
                .map(|(name, cfg)| (name.as_str(), cfg)),
        );
        for (name, cfg) in breakers {
            cfg.to_resilience_config().validate().map_err(|reason| {
                ConfigurationError::ValidationError(format!("circuit breaker '{name}': {reason}"))
            })?;
        }

        self.validate_scoring()?;

        for collector in &self.collectors {
            if collector.category.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "category",
                    "collectors entry",
                ));
            }
            if collector.url.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "url",
                    format!("collector '{}'", collector.category),
                ));
            }
        }

        if self.persistence.enabled && self.persistence.database_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database_url",
                "persistence",
            ));
        }

        Ok(())
    }

    fn validate_scoring(&self) -> ConfigResult<()> {
        let scoring = &self.scoring;
        if scoring.min_categories == 0 {
            return Err(ConfigurationError::invalid_value(
                "scoring.min_categories",
                scoring.min_categories,
                "must be at least 1",
            ));
        }
        if !(scoring.default_weight.is_finite() && scoring.default_weight >= 0.0) {
            return Err(ConfigurationError::invalid_value(
                "scoring.default_weight",
                scoring.default_weight,
                "must be a non-negative number",
            ));
        }
        for (category, weight) in &scoring.weights {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(ConfigurationError::invalid_value(
                    format!("scoring.weights.{category}"),
                    weight,
                    "must be a non-negative number",
                ));
            }
        }
        if scoring.require_normalized_weights && !scoring.weights.is_empty() {
            let total: f64 = scoring.weights.values().sum();
            if !(0.99..=1.01).contains(&total) {
                return Err(ConfigurationError::ValidationError(format!(
                    "scoring weights must sum to 1.0, got {total:.3}"
                )));
            }
        }
        let t = &scoring.thresholds;
        if !(t.excellent >= t.good && t.good >= t.moderate && t.moderate >= t.poor) {
            return Err(ConfigurationError::ValidationError(
                "recommendation thresholds must be descending".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SiteScoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_collector_timeout_cannot_exceed_deadline() {
        let mut config = SiteScoreConfig::default();
        config.orchestrator.collector_timeout_ms = 40_000;
        config.orchestrator.request_deadline_ms = 30_000;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collector_timeout_ms"));
    }

    #[test]
    fn test_batch_size_capped_at_fifty() {
        let mut config = SiteScoreConfig::default();
        config.batch.max_batch_size = 51;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_weight_check() {
        let mut config = SiteScoreConfig::default();
        config.scoring.require_normalized_weights = true;
        config.scoring.weights = HashMap::from([
            ("demographics".to_string(), 0.25),
            ("competition".to_string(), 0.20),
            ("accessibility".to_string(), 0.15),
            ("safety".to_string(), 0.20),
            ("economic".to_string(), 0.15),
            ("regulatory".to_string(), 0.05),
        ]);
        assert!(config.validate().is_ok());

        config.scoring.weights.insert("regulatory".to_string(), 0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let mut config = SiteScoreConfig::default();
        config.circuit_breakers.default_config.failure_threshold = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("circuit breaker 'default'"));
    }
}
