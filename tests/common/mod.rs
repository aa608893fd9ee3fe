//! Shared helpers for integration tests: scripted collectors, a durable cache
//! backend that can be switched off, and engine builders.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sitescore_core::cache::{CacheBackend, CacheError, CacheResult, MemoryCacheBackend, ResponseCache};
use sitescore_core::collectors::{Collector, CollectorError, CollectorRegistry};
use sitescore_core::config::SiteScoreConfig;
use sitescore_core::models::{AnalysisRequest, CollectorResult, Confidence};
use sitescore_core::orchestration::Orchestrator;
use sitescore_core::persistence::PersistenceSink;
use sitescore_core::resilience::CircuitBreakerManager;

/// Scores from the reference six-collector scenario
pub const SIX_SCORES: [f64; 6] = [80.0, 70.0, 90.0, 60.0, 75.0, 85.0];

/// Collector with scripted latency and failure behavior
#[derive(Debug)]
pub struct MockCollector {
    category: String,
    score: f64,
    delay: Duration,
    failing: AtomicBool,
    panics: bool,
    calls: AtomicUsize,
    cancellations: AtomicUsize,
}

impl MockCollector {
    pub fn new(category: impl Into<String>, score: f64) -> Self {
        Self {
            category: category.into(),
            score,
            delay: Duration::from_millis(5),
            failing: AtomicBool::new(false),
            panics: false,
            calls: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn category(&self) -> &str {
        &self.category
    }

    async fn collect(
        &self,
        _request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<CollectorResult, CollectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                return Err(CollectorError::Cancelled);
            }
            _ = tokio::time::sleep(self.delay) => {}
        }

        if self.panics {
            panic!("scripted collector panic");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollectorError::Upstream("scripted failure".to_string()));
        }

        Ok(CollectorResult::new(self.category.clone(), self.score)
            .with_metric("sample_size", 10.0)
            .with_confidence(Confidence::High))
    }
}

/// Durable cache tier that can be taken offline
#[derive(Debug, Default)]
pub struct ToggleableBackend {
    inner: MemoryCacheBackend,
    down: AtomicBool,
    operations: AtomicUsize,
}

impl ToggleableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        let backend = Self::default();
        backend.set_down(true);
        backend
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Operations that actually reached the backing store
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("backend offline".to_string()));
        }
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for ToggleableBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn clear(&self, prefix: &str) -> CacheResult<u64> {
        self.check()?;
        self.inner.clear(prefix).await
    }

    async fn len(&self, prefix: &str) -> CacheResult<u64> {
        self.check()?;
        self.inner.len(prefix).await
    }

    async fn ping(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    fn provider_name(&self) -> &'static str {
        "toggleable"
    }
}

/// Configuration with short timeouts suited to tests
pub fn test_config() -> SiteScoreConfig {
    let mut config = SiteScoreConfig::default();
    config.environment = "test".to_string();
    config.orchestrator.collector_timeout_ms = 200;
    config.orchestrator.request_deadline_ms = 1_000;
    config
}

/// `category_1..=category_n` collectors with the given scores
pub fn scored_collectors(scores: &[f64]) -> Vec<Arc<MockCollector>> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| Arc::new(MockCollector::new(format!("category_{}", i + 1), *score)))
        .collect()
}

pub fn registry_of(collectors: &[Arc<MockCollector>]) -> CollectorRegistry {
    let mut registry = CollectorRegistry::new();
    for collector in collectors {
        registry
            .register(Arc::clone(collector) as Arc<dyn Collector>)
            .expect("register mock collector");
    }
    registry
}

/// Everything an integration test needs to drive and inspect the engine
pub struct TestEngine {
    pub orchestrator: Arc<Orchestrator>,
    pub cache: Arc<ResponseCache>,
    pub breakers: Arc<CircuitBreakerManager>,
}

pub fn build_engine(config: &SiteScoreConfig, collectors: &[Arc<MockCollector>]) -> TestEngine {
    build_engine_with(config, collectors, None, None)
}

pub fn build_engine_with(
    config: &SiteScoreConfig,
    collectors: &[Arc<MockCollector>],
    cache: Option<Arc<ResponseCache>>,
    persistence: Option<Arc<dyn PersistenceSink>>,
) -> TestEngine {
    let cache = cache.unwrap_or_else(|| Arc::new(ResponseCache::volatile(&config.cache)));
    let breakers = Arc::new(CircuitBreakerManager::from_config(&config.circuit_breakers));

    let mut builder = Orchestrator::builder(config.clone())
        .collectors(registry_of(collectors))
        .circuit_breakers(Arc::clone(&breakers))
        .cache(Arc::clone(&cache));
    if let Some(sink) = persistence {
        builder = builder.persistence(sink);
    }

    TestEngine {
        orchestrator: Arc::new(builder.build().expect("build orchestrator")),
        cache,
        breakers,
    }
}
