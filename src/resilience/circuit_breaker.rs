//! # Circuit Breaker Implementation
//!
//! Fault isolation for a single collector identity. Classic three-state
//! machine: Closed (normal operation), Open (failing fast) and Half-Open
//! (admitting a limited number of trial calls).
//!
//! State transitions happen under a per-breaker `parking_lot::Mutex` that is
//! never held across an await. Call counters are lock-free atomics.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lock-free atomic counters for circuit breaker metrics.
#[derive(Debug, Default)]
struct AtomicCircuitBreakerMetrics {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    rejected_count: AtomicU64,
    total_duration_nanos: AtomicU64,
}

impl AtomicCircuitBreakerMetrics {
    #[inline]
    fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_rejection(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.rejected_count.store(0, Ordering::Relaxed);
        self.total_duration_nanos.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self, core: &BreakerCore) -> CircuitBreakerMetrics {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let success_count = self.success_count.load(Ordering::Relaxed);
        let failure_count = self.failure_count.load(Ordering::Relaxed);
        let total_duration_nanos = self.total_duration_nanos.load(Ordering::Relaxed);

        let (failure_rate, success_rate, average_duration_ms) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                success_count as f64 / total_calls as f64,
                total_duration_nanos as f64 / total_calls as f64 / 1_000_000.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count,
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            consecutive_failures: core.consecutive_failures,
            consecutive_successes: core.consecutive_successes,
            current_state: core.state,
            failure_rate,
            success_rate,
            average_duration_ms,
        }
    }
}

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Mutable state machine guarded by the breaker's own lock
#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    /// Trial calls admitted in the current half-open window and not yet settled
    half_open_in_flight: u32,
    /// Bumped on every transition so late results from an earlier window are recognisable
    generation: u64,
    last_transition: Instant,
    last_transition_at: DateTime<Utc>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl BreakerCore {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_in_flight: 0,
            generation: 0,
            last_transition: Instant::now(),
            last_transition_at: Utc::now(),
            last_failure_at: None,
        }
    }

    fn transition(&mut self, state: CircuitState) {
        self.state = state;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_in_flight = 0;
        self.generation += 1;
        self.last_transition = Instant::now();
        self.last_transition_at = Utc::now();
    }
}

/// Serializable view of one breaker, as served by `/circuit-breakers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub time_in_state_ms: u64,
    pub last_transition_at: DateTime<Utc>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub metrics: CircuitBreakerMetrics,
}

/// Admission ticket for one protected call
///
/// Settle it with [`CallPermit::succeeded`] or [`CallPermit::failed`].
/// Dropping an unsettled permit (the call was abandoned) frees its half-open
/// trial slot without counting as a success or a failure.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    generation: u64,
    started: Instant,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker
            .record_success(self.trial, self.generation, self.started.elapsed());
    }

    pub fn failed(mut self) {
        self.settled = true;
        self.breaker
            .record_failure(self.generation, self.started.elapsed());
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

/// Per-identity circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    core: Mutex<BreakerCore>,

    metrics: AtomicCircuitBreakerMetrics,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_ms = config.timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            core: Mutex::new(BreakerCore::new()),
            metrics: AtomicCircuitBreakerMetrics::default(),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().ok_or_else(|| CircuitBreakerError::CircuitOpen {
            component: self.name.clone(),
        })?;

        let result = operation().await;

        match &result {
            Ok(_) => permit.succeeded(),
            Err(_) => permit.failed(),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Ask to make a call. `None` means the call is rejected.
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open
    /// here and admits the caller as its first trial.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut core = self.core.lock();

        let state = core.state;
        let trial = match state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if core.last_transition.elapsed() < self.config.timeout {
                    drop(core);
                    self.metrics.record_rejection();
                    debug!(component = %self.name, "Circuit open, rejecting call");
                    return None;
                }
                core.transition(CircuitState::HalfOpen);
                info!(component = %self.name, "Circuit breaker half-open (testing recovery)");
                true
            }
            CircuitState::HalfOpen => {
                if core.half_open_in_flight >= self.config.half_open_max_calls {
                    drop(core);
                    self.metrics.record_rejection();
                    debug!(component = %self.name, "Half-open trial slots exhausted, rejecting call");
                    return None;
                }
                true
            }
        };

        if trial {
            core.half_open_in_flight += 1;
        }

        Some(CallPermit {
            breaker: self,
            trial,
            generation: core.generation,
            started: Instant::now(),
            settled: false,
        })
    }

    fn record_success(&self, trial: bool, generation: u64, duration: Duration) {
        self.metrics.record_success(duration);

        let mut core = self.core.lock();
        let state = core.state;
        match state {
            CircuitState::Closed if core.generation == generation => {
                core.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if core.generation == generation => {
                if trial {
                    core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
                }
                core.consecutive_successes += 1;
                if core.consecutive_successes >= self.config.success_threshold {
                    core.transition(CircuitState::Closed);
                    drop(core);
                    info!(
                        component = %self.name,
                        total_calls = self.metrics.total_calls.load(Ordering::Relaxed),
                        "Circuit breaker closed (recovered)"
                    );
                }
            }
            // Late result from a call admitted before the latest transition
            CircuitState::Closed | CircuitState::HalfOpen | CircuitState::Open => {
                debug!(component = %self.name, "Ignoring stale success");
            }
        }
    }

    fn record_failure(&self, generation: u64, duration: Duration) {
        self.metrics.record_failure(duration);

        let mut core = self.core.lock();
        core.last_failure_at = Some(Utc::now());
        let state = core.state;
        match state {
            CircuitState::Closed if core.generation == generation => {
                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold {
                    let failures = core.consecutive_failures;
                    core.transition(CircuitState::Open);
                    drop(core);
                    warn!(
                        component = %self.name,
                        consecutive_failures = failures,
                        recovery_timeout_ms = self.config.timeout.as_millis() as u64,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen if core.generation == generation => {
                core.transition(CircuitState::Open);
                drop(core);
                warn!(component = %self.name, "Trial call failed, circuit breaker re-opened");
            }
            CircuitState::Closed | CircuitState::HalfOpen | CircuitState::Open => {
                debug!(component = %self.name, "Ignoring stale failure");
            }
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.state == CircuitState::HalfOpen && core.generation == generation {
            core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        self.core.lock().transition(CircuitState::Open);
        warn!(component = %self.name, "Circuit breaker forced open");
    }

    /// Force circuit to closed state (for recovery situations)
    pub fn force_closed(&self) {
        self.core.lock().transition(CircuitState::Closed);
        info!(component = %self.name, "Circuit breaker forced closed");
    }

    /// Close the breaker and zero every counter
    pub fn reset(&self) {
        let mut core = self.core.lock();
        core.transition(CircuitState::Closed);
        core.last_failure_at = None;
        self.metrics.reset();
        drop(core);
        info!(component = %self.name, "Circuit breaker reset");
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let core = self.core.lock();
        self.metrics.snapshot(&core)
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let core = self.core.lock();
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: core.state,
            failure_count: core.consecutive_failures,
            success_count: core.consecutive_successes,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            recovery_timeout_ms: self.config.timeout.as_millis() as u64,
            time_in_state_ms: core.last_transition.elapsed().as_millis() as u64,
            last_transition_at: core.last_transition_at,
            last_failure_at: core.last_failure_at,
            metrics: self.metrics.snapshot(&core),
        }
    }

    /// Check if circuit is healthy (closed state with low failure rate)
    pub fn is_healthy(&self) -> bool {
        self.metrics().is_healthy() && self.state() == CircuitState::Closed
    }
}
