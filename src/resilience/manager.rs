//! # Circuit Breaker Manager
//!
//! Registry of circuit breakers keyed by collector identity. Breakers are
//! created lazily on first use and live for the life of the process.
//!
//! The map is a sharded `DashMap` and each breaker carries its own lock, so
//! activity on one collector never blocks another.

use crate::config::CircuitBreakerConfig as CircuitBreakerSettings;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerStatus, CircuitState, SystemCircuitBreakerMetrics,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Manager for the circuit breakers of every collector
#[derive(Debug)]
pub struct CircuitBreakerManager {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    settings: CircuitBreakerSettings,
}

impl CircuitBreakerManager {
    pub fn from_config(settings: &CircuitBreakerSettings) -> Self {
        info!(
            enabled = settings.enabled,
            component_overrides = settings.component_configs.len(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: DashMap::new(),
            settings: settings.clone(),
        }
    }

    /// Whether collector calls should be routed through breakers at all
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Get or create circuit breaker for a component
    pub fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.circuit_breakers.get(component_name) {
            return Arc::clone(breaker.value());
        }

        let entry = self
            .circuit_breakers
            .entry(component_name.to_string())
            .or_insert_with(|| {
                let config = self
                    .settings
                    .config_for_component(component_name)
                    .to_resilience_config();
                Arc::new(CircuitBreaker::new(component_name.to_string(), config))
            });

        Arc::clone(entry.value())
    }

    /// Get all circuit breaker names
    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Status of every breaker, sorted by name
    pub fn statuses(&self) -> Vec<CircuitBreakerStatus> {
        let mut statuses: Vec<CircuitBreakerStatus> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.value().status())
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn get_system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system = SystemCircuitBreakerMetrics::new();
        for entry in self.circuit_breakers.iter() {
            system.add_circuit_breaker(entry.key().clone(), entry.value().metrics());
        }
        system
    }

    /// Close every breaker and clear its counters; returns how many were reset
    pub fn reset_all(&self) -> usize {
        let mut count = 0;
        for entry in self.circuit_breakers.iter() {
            entry.value().reset();
            count += 1;
        }
        info!(reset = count, "Reset all circuit breakers");
        count
    }

    /// Names of breakers currently open
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .circuit_breakers
            .iter()
            .filter(|entry| entry.value().state() == CircuitState::Open)
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Fraction of breakers not open (1.0 with no breakers)
    pub fn system_health_score(&self) -> f64 {
        self.get_system_metrics().health_score()
    }
}
