//! # Circuit Breaker Configuration
//!
//! Runtime thresholds for a single circuit breaker. The TOML-facing shape
//! lives in `crate::config::CircuitBreakerComponentConfig` and converts into
//! this type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub timeout: Duration,

    /// Number of consecutive successes in half-open state to close circuit
    pub success_threshold: u32,

    /// Trial calls allowed in flight while half-open
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    /// Thresholds suited to slow third-party data providers
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
            half_open_max_calls: 2,
        }
    }

    /// Thresholds for the durable cache tier, which should recover quickly
    pub fn for_cache() -> Self {
        Self {
            failure_threshold: 3,
            timeout: Duration::from_secs(15),
            success_threshold: 1,
            half_open_max_calls: 1,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.timeout > Duration::from_secs(3600) {
            return Err("timeout should not exceed 3600 seconds".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        if self.success_threshold > 50 {
            return Err("success_threshold should not exceed 50".to_string());
        }

        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::for_external_api()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(CircuitBreakerConfig::for_external_api().validate().is_ok());
        assert!(CircuitBreakerConfig::for_cache().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = CircuitBreakerConfig::default();
        config.failure_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = CircuitBreakerConfig::default();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = CircuitBreakerConfig::default();
        config.half_open_max_calls = 0;
        assert!(config.validate().is_err());
    }
}
