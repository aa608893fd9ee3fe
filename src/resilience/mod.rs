//! # Resilience
//!
//! Circuit breakers that isolate failing collectors from the rest of the
//! fan-out, plus the registry that owns one breaker per collector identity.

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerError, CircuitBreakerStatus, CircuitState,
};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
