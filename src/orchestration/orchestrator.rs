//! # Orchestrator
//!
//! Serves one analysis request end to end:
//!
//! ```text
//! fingerprint → cache hit? ──yes──→ cached response
//!                  │ no
//!                  ▼
//!   JoinSet fan-out  (breaker → worker slot → per-call timeout)
//!                  │  all settled or request deadline
//!                  ▼
//!   ScoreAggregator → cache write → detached persistence → response
//! ```
//!
//! Collector failures only ever remove a category from the result. The
//! request fails only when nothing succeeded (`AggregateUnavailable`) or the
//! request itself is invalid.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::aggregator::ScoreAggregator;
use super::metrics::EngineMetrics;
use crate::cache::ResponseCache;
use crate::collectors::{Collector, CollectorError, CollectorRegistry, HttpJsonCollector};
use crate::config::{OrchestratorConfig, SiteScoreConfig};
use crate::error::{AggregatorError, AggregatorResult};
use crate::log_analysis;
use crate::models::{
    AnalysisRequest, AnalysisResponse, CategoryOutcome, CollectorOutcome, CompositeResult,
    LocationQuery,
};
use crate::persistence::{PersistenceSink, RequestMetadata};
use crate::resilience::{CircuitBreaker, CircuitBreakerManager};

/// Builder for [`Orchestrator`]
///
/// Every dependency is optional; missing ones are built from the
/// configuration passed to [`Orchestrator::builder`].
#[derive(Debug)]
pub struct OrchestratorBuilder {
    config: SiteScoreConfig,
    collectors: Option<CollectorRegistry>,
    circuit_breakers: Option<Arc<CircuitBreakerManager>>,
    cache: Option<Arc<ResponseCache>>,
    persistence: Option<Arc<dyn PersistenceSink>>,
}

impl OrchestratorBuilder {
    pub fn collectors(mut self, collectors: CollectorRegistry) -> Self {
        self.collectors = Some(collectors);
        self
    }

    pub fn circuit_breakers(mut self, circuit_breakers: Arc<CircuitBreakerManager>) -> Self {
        self.circuit_breakers = Some(circuit_breakers);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(sink);
        self
    }

    pub fn build(self) -> AggregatorResult<Orchestrator> {
        self.config.validate()?;

        let collectors = match self.collectors {
            Some(collectors) => collectors,
            None => collectors_from_config(&self.config)?,
        };
        let circuit_breakers = self.circuit_breakers.unwrap_or_else(|| {
            Arc::new(CircuitBreakerManager::from_config(
                &self.config.circuit_breakers,
            ))
        });
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResponseCache::volatile(&self.config.cache)));

        let settings = self.config.orchestrator.clone();
        info!(
            collectors = collectors.len(),
            max_concurrent_collectors = settings.max_concurrent_collectors,
            collector_timeout_ms = settings.collector_timeout_ms,
            request_deadline_ms = settings.request_deadline_ms,
            persistence = self.persistence.is_some(),
            "Orchestrator initialized"
        );

        Ok(Orchestrator {
            worker_limit: Arc::new(Semaphore::new(settings.max_concurrent_collectors)),
            collectors: Arc::new(collectors),
            circuit_breakers,
            cache,
            persistence: self.persistence,
            aggregator: ScoreAggregator::new(self.config.scoring.clone()),
            metrics: Arc::new(EngineMetrics::new()),
            settings,
        })
    }
}

/// Build HTTP collectors for every `[[collectors]]` entry in the config
pub fn collectors_from_config(config: &SiteScoreConfig) -> AggregatorResult<CollectorRegistry> {
    let mut registry = CollectorRegistry::new();
    if config.collectors.is_empty() {
        return Ok(registry);
    }

    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| AggregatorError::Configuration(format!("HTTP client: {e}")))?;

    for collector in &config.collectors {
        registry.register(Arc::new(HttpJsonCollector::from_config(
            collector,
            client.clone(),
        )))?;
    }
    Ok(registry)
}

/// Everything one spawned collector task needs
struct CollectorCall {
    index: usize,
    category: String,
    collector: Arc<dyn Collector>,
    breaker: Option<Arc<CircuitBreaker>>,
    worker_limit: Arc<Semaphore>,
    timeout: Duration,
    request: Arc<AnalysisRequest>,
    cancel: CancellationToken,
}

impl CollectorCall {
    async fn run(self) -> (usize, CategoryOutcome) {
        let started = Instant::now();

        let outcome = match &self.breaker {
            None => self.invoke().await,
            Some(breaker) => match breaker.try_acquire() {
                None => CollectorOutcome::Rejected,
                Some(permit) => {
                    let outcome = self.invoke().await;
                    match &outcome {
                        CollectorOutcome::Succeeded(_) => permit.succeeded(),
                        CollectorOutcome::TimedOut | CollectorOutcome::Failed(_) => {
                            permit.failed()
                        }
                        // dropping the permit frees the trial slot
                        CollectorOutcome::Rejected => {}
                    }
                    outcome
                }
            },
        };

        let elapsed = started.elapsed();
        log_collector_outcome(&self.category, &outcome, elapsed);
        (
            self.index,
            CategoryOutcome::new(self.category, outcome, elapsed),
        )
    }

    async fn invoke(&self) -> CollectorOutcome {
        let _slot = match Arc::clone(&self.worker_limit).acquire_owned().await {
            Ok(slot) => slot,
            Err(_) => {
                return CollectorOutcome::Failed(CollectorError::Other(
                    "worker pool closed".to_string(),
                ))
            }
        };

        let started = Instant::now();
        let call = AssertUnwindSafe(
            self.collector
                .collect(&self.request, self.cancel.clone()),
        )
        .catch_unwind();

        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                self.cancel.cancel();
                CollectorOutcome::TimedOut
            }
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                CollectorOutcome::Failed(CollectorError::Other(format!(
                    "collector panicked: {message}"
                )))
            }
            Ok(Ok(Err(error))) => CollectorOutcome::Failed(error),
            Ok(Ok(Ok(mut result))) => {
                if !result.success {
                    return CollectorOutcome::Failed(CollectorError::Other(
                        "collector reported failure".to_string(),
                    ));
                }
                if !result.score.is_finite() {
                    return CollectorOutcome::Failed(CollectorError::InvalidResponse(format!(
                        "non-finite score {}",
                        result.score
                    )));
                }
                result.score = result.score.clamp(0.0, 100.0);
                result.category = self.category.clone();
                result.elapsed_ms = started.elapsed().as_millis() as u64;
                CollectorOutcome::Succeeded(result)
            }
        }
    }
}

fn log_collector_outcome(category: &str, outcome: &CollectorOutcome, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match outcome {
        CollectorOutcome::Succeeded(result) => debug!(
            category = %category,
            score = result.score,
            elapsed_ms = elapsed_ms,
            "Collector succeeded"
        ),
        CollectorOutcome::TimedOut => warn!(
            category = %category,
            elapsed_ms = elapsed_ms,
            "Collector timed out"
        ),
        CollectorOutcome::Rejected => debug!(
            category = %category,
            "Collector skipped, circuit breaker open"
        ),
        CollectorOutcome::Failed(error) => warn!(
            category = %category,
            error = %error,
            elapsed_ms = elapsed_ms,
            "Collector failed"
        ),
    }
}

/// Request-level coordinator that owns the collector fan-out
#[derive(Debug)]
pub struct Orchestrator {
    collectors: Arc<CollectorRegistry>,
    circuit_breakers: Arc<CircuitBreakerManager>,
    cache: Arc<ResponseCache>,
    persistence: Option<Arc<dyn PersistenceSink>>,
    aggregator: ScoreAggregator,
    worker_limit: Arc<Semaphore>,
    metrics: Arc<EngineMetrics>,
    settings: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder(config: SiteScoreConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            collectors: None,
            circuit_breakers: None,
            cache: None,
            persistence: None,
        }
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.circuit_breakers
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn persistence(&self) -> Option<&Arc<dyn PersistenceSink>> {
        self.persistence.as_ref()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &OrchestratorConfig {
        &self.settings
    }

    /// Validate an unvetted query and analyze it
    pub async fn analyze_query(&self, query: LocationQuery) -> AggregatorResult<AnalysisResponse> {
        let request = match AnalysisRequest::from_query(&query) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_invalid_request();
                return Err(e);
            }
        };
        self.analyze(&request).await
    }

    #[instrument(skip(self, request), fields(location = %request.location(), radius = request.radius()))]
    pub async fn analyze(&self, request: &AnalysisRequest) -> AggregatorResult<AnalysisResponse> {
        let started = Instant::now();
        let analysis_id = Uuid::new_v4();
        let fingerprint = request.fingerprint();
        self.metrics.record_request();

        let selected = match self.collectors.select(request) {
            Ok(selected) => selected,
            Err(e) => {
                self.metrics.record_invalid_request();
                return Err(e);
            }
        };

        if let Some(entry) = self.cache.get(&fingerprint).await {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            self.metrics.record_cache_hit();
            self.metrics.record_duration(elapsed_ms);
            log_analysis!(info, "CACHE_HIT", fingerprint: fingerprint, elapsed_ms: elapsed_ms);

            return Ok(AnalysisResponse {
                analysis_id,
                location: request.display_location().to_string(),
                radius: request.radius(),
                fingerprint,
                result: entry.result,
                cached: true,
                partial: false,
                elapsed_ms,
                collectors: Vec::new(),
            });
        }

        let outcomes = self.fan_out(request, selected).await;
        for outcome in &outcomes {
            self.metrics.record_collector_outcome(outcome.outcome.status());
        }

        let result = match self.aggregator.aggregate(request, &outcomes) {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_aggregate_failure();
                self.metrics
                    .record_duration(started.elapsed().as_millis() as u64);
                log_analysis!(warn, "UNAVAILABLE", fingerprint: fingerprint, attempted: outcomes.len());
                return Err(e);
            }
        };

        self.cache
            .set(&fingerprint, &result, self.cache.ttl())
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_duration(elapsed_ms);
        let partial = outcomes.iter().any(|o| !o.outcome.is_success());
        if partial || result.partial {
            self.metrics.record_partial();
        }

        self.notify_persistence(
            &result,
            RequestMetadata::from_request(analysis_id, request, elapsed_ms),
        );

        log_analysis!(
            info,
            "COMPLETED",
            fingerprint: fingerprint,
            overall_score: result.overall_score,
            succeeded: result.succeeded.len(),
            missing: result.missing,
            elapsed_ms: elapsed_ms
        );

        Ok(AnalysisResponse {
            analysis_id,
            location: request.display_location().to_string(),
            radius: request.radius(),
            fingerprint,
            partial: partial || result.partial,
            collectors: outcomes.iter().map(CategoryOutcome::report).collect(),
            result,
            cached: false,
            elapsed_ms,
        })
    }

    /// Run every selected collector concurrently under one request deadline
    ///
    /// Outcomes come back in selection order. Collectors still running when
    /// the deadline passes are cancelled and reported as `TimedOut`.
    async fn fan_out(
        &self,
        request: &AnalysisRequest,
        selected: Vec<(String, Arc<dyn Collector>)>,
    ) -> Vec<CategoryOutcome> {
        let started = Instant::now();
        let deadline = started + self.settings.request_deadline();
        let request = Arc::new(request.clone());
        let cancel = CancellationToken::new();
        let categories: Vec<String> = selected.iter().map(|(c, _)| c.clone()).collect();

        let mut tasks = JoinSet::new();
        for (index, (category, collector)) in selected.into_iter().enumerate() {
            let breaker = self
                .circuit_breakers
                .is_enabled()
                .then(|| self.circuit_breakers.get_circuit_breaker(&category));

            let call = CollectorCall {
                index,
                category,
                collector,
                breaker,
                worker_limit: Arc::clone(&self.worker_limit),
                timeout: self.settings.collector_timeout(),
                request: Arc::clone(&request),
                cancel: cancel.child_token(),
            };
            tasks.spawn(call.run());
        }

        let mut settled: Vec<Option<CategoryOutcome>> = categories.iter().map(|_| None).collect();

        let all_settled = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => settled[index] = Some(outcome),
                    Err(e) => warn!(error = %e, "Collector task ended abnormally"),
                }
            }
        })
        .await
        .is_ok();

        if !all_settled {
            cancel.cancel();
            tasks.abort_all();
            warn!(
                deadline_ms = self.settings.request_deadline_ms,
                unsettled = settled.iter().filter(|o| o.is_none()).count(),
                "Request deadline reached, cancelling remaining collectors"
            );
        }

        let elapsed = started.elapsed();
        categories
            .into_iter()
            .zip(settled)
            .map(|(category, outcome)| {
                outcome.unwrap_or_else(|| {
                    CategoryOutcome::new(category, CollectorOutcome::TimedOut, elapsed)
                })
            })
            .collect()
    }

    fn notify_persistence(&self, result: &CompositeResult, metadata: RequestMetadata) {
        let Some(sink) = self.persistence.clone() else {
            return;
        };
        let result = result.clone();

        tokio::spawn(async move {
            match sink.save(&result, &metadata).await {
                Ok(record_id) => debug!(
                    record_id = record_id,
                    fingerprint = %metadata.fingerprint,
                    "Analysis persisted"
                ),
                Err(e) => warn!(
                    error = %e,
                    fingerprint = %metadata.fingerprint,
                    "Failed to persist analysis"
                ),
            }
        });
    }
}
