//! Error types for the aggregation engine.
//!

use crate::cache::CacheError;
use crate::collectors::CollectorError;
use crate::config::ConfigurationError;
use crate::persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregatorError {
    #[error("Collector {category} timed out after {timeout_ms}ms")]
    CollectorTimeout { category: String, timeout_ms: u64 },
    #[error("Collector {category} failed: {message}")]
    CollectorError { category: String, message: String },
    #[error("Circuit breaker open for {0}")]
    CircuitOpen(String),
    #[error("Cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),
    #[error("No data available: all {attempted} collectors failed")]
    AggregateUnavailable {
        attempted: usize,
        missing: Vec<String>,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AggregatorError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Machine-readable code used in API error bodies and batch item errors
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollectorTimeout { .. } => "COLLECTOR_TIMEOUT",
            Self::CollectorError { .. } => "COLLECTOR_ERROR",
            Self::CircuitOpen(_) => "CIRCUIT_OPEN",
            Self::CacheBackendUnavailable(_) => "CACHE_BACKEND_UNAVAILABLE",
            Self::AggregateUnavailable { .. } => "AGGREGATE_UNAVAILABLE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error fails the request it belongs to
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            Self::AggregateUnavailable { .. } | Self::InvalidRequest(_) | Self::Internal(_)
        )
    }
}

impl From<serde_json::Error> for AggregatorError {
    fn from(error: serde_json::Error) -> Self {
        AggregatorError::Internal(format!("JSON serialization error: {error}"))
    }
}

impl From<CacheError> for AggregatorError {
    fn from(error: CacheError) -> Self {
        AggregatorError::CacheBackendUnavailable(error.to_string())
    }
}

impl From<PersistenceError> for AggregatorError {
    fn from(error: PersistenceError) -> Self {
        AggregatorError::Persistence(error.to_string())
    }
}

impl From<ConfigurationError> for AggregatorError {
    fn from(error: ConfigurationError) -> Self {
        AggregatorError::Configuration(error.to_string())
    }
}

impl From<CollectorError> for AggregatorError {
    fn from(error: CollectorError) -> Self {
        AggregatorError::CollectorError {
            category: String::new(),
            message: error.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AggregatorError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            AggregatorError::Internal("analysis task panicked".to_string())
        } else {
            AggregatorError::Internal("analysis task was cancelled".to_string())
        }
    }
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
