//! Engine-wide counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::OutcomeStatus;

#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,
    requests_total: AtomicU64,
    cache_hits: AtomicU64,
    partial_results: AtomicU64,
    aggregate_failures: AtomicU64,
    invalid_requests: AtomicU64,
    collector_succeeded: AtomicU64,
    collector_timed_out: AtomicU64,
    collector_rejected: AtomicU64,
    collector_failed: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            partial_results: AtomicU64::new(0),
            aggregate_failures: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            collector_succeeded: AtomicU64::new(0),
            collector_timed_out: AtomicU64::new(0),
            collector_rejected: AtomicU64::new(0),
            collector_failed: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }
}

/// Serializable view of [`EngineMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineMetricsSnapshot {
    pub uptime_seconds: u64,
    pub requests_total: u64,
    pub cache_hits: u64,
    pub partial_results: u64,
    pub aggregate_failures: u64,
    pub invalid_requests: u64,
    pub collector_calls: CollectorCallCounts,
    /// Share of requests that failed with no usable result
    pub error_rate: f64,
    pub average_duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorCallCounts {
    pub succeeded: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial(&self) {
        self.partial_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregate_failure(&self) {
        self.aggregate_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_request(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collector_outcome(&self, status: OutcomeStatus) {
        let counter = match status {
            OutcomeStatus::Succeeded => &self.collector_succeeded,
            OutcomeStatus::TimedOut => &self.collector_timed_out,
            OutcomeStatus::Rejected => &self.collector_rejected,
            OutcomeStatus::Failed => &self.collector_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duration(&self, elapsed_ms: u64) {
        self.total_duration_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn error_rate(&self) -> f64 {
        let requests = self.requests_total.load(Ordering::Relaxed);
        if requests == 0 {
            return 0.0;
        }
        self.aggregate_failures.load(Ordering::Relaxed) as f64 / requests as f64
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        let requests_total = self.requests_total.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        EngineMetricsSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            requests_total,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            partial_results: self.partial_results.load(Ordering::Relaxed),
            aggregate_failures: self.aggregate_failures.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            collector_calls: CollectorCallCounts {
                succeeded: self.collector_succeeded.load(Ordering::Relaxed),
                timed_out: self.collector_timed_out.load(Ordering::Relaxed),
                rejected: self.collector_rejected.load(Ordering::Relaxed),
                failed: self.collector_failed.load(Ordering::Relaxed),
            },
            error_rate: self.error_rate(),
            average_duration_ms: if requests_total == 0 {
                0.0
            } else {
                total_duration_ms as f64 / requests_total as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.error_rate(), 0.0);

        for _ in 0..4 {
            metrics.record_request();
        }
        metrics.record_aggregate_failure();
        assert!((metrics.error_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_counts_outcomes() {
        let metrics = EngineMetrics::new();
        metrics.record_collector_outcome(OutcomeStatus::Succeeded);
        metrics.record_collector_outcome(OutcomeStatus::Succeeded);
        metrics.record_collector_outcome(OutcomeStatus::Rejected);
        metrics.record_collector_outcome(OutcomeStatus::TimedOut);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.collector_calls.succeeded, 2);
        assert_eq!(snapshot.collector_calls.rejected, 1);
        assert_eq!(snapshot.collector_calls.timed_out, 1);
        assert_eq!(snapshot.collector_calls.failed, 0);
    }
}
