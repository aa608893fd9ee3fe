//! # Response Cache
//!
//! Composite results keyed by request fingerprint, stored in two tiers:
//!
//! - **Durable**: an optional shared backend (Redis). Every call first goes
//!   through a dedicated circuit breaker, then a `ping` and the operation
//!   itself under a short timeout.
//! - **Volatile**: an in-process map that takes over whenever the durable
//!   tier is unconfigured, unreachable, tripped or erroring.
//!
//! Cache failures never reach callers. Each call that wanted the durable
//! tier but had to use the volatile one is counted in
//! [`CacheStats::fallback_operations`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::{CacheError, CacheResult};
use super::providers::MemoryCacheBackend;
use super::traits::CacheBackend;
use crate::config::CacheConfig;
use crate::models::{CompositeResult, RequestFingerprint};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Stored payload for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: RequestFingerprint,
    pub result: CompositeResult,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_milliseconds() >= i64::try_from(self.ttl_ms).unwrap_or(i64::MAX)
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// Live entries in the tier currently serving calls
    pub size: u64,
    /// `"durable"` or `"fallback"`
    pub backend: String,
    pub hit_rate: f64,
    pub fallback_operations: u64,
    pub durable_provider: Option<String>,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    fallback_operations: AtomicU64,
}

#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    durable: Option<Arc<dyn CacheBackend>>,
    volatile: MemoryCacheBackend,
    durable_breaker: CircuitBreaker,
    operation_timeout: Duration,
    counters: CacheCounters,
}

impl ResponseCache {
    /// Volatile tier only
    pub fn volatile(config: &CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Durable tier backed by `backend`, volatile tier as fallback
    pub fn with_durable(config: &CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self::build(config, Some(backend))
    }

    /// Connect the configured durable tier, degrading to volatile-only when
    /// it cannot be reached or support for it is not compiled in.
    pub async fn from_config_graceful(config: &CacheConfig) -> Self {
        let Some(redis_config) = config.redis.as_ref() else {
            info!("No durable cache tier configured, using in-memory cache");
            return Self::volatile(config);
        };

        match connect_durable(redis_config).await {
            Some(backend) => Self::with_durable(config, backend),
            None => Self::volatile(config),
        }
    }

    fn build(config: &CacheConfig, durable: Option<Arc<dyn CacheBackend>>) -> Self {
        let operation_timeout = Duration::from_millis(
            config
                .redis
                .as_ref()
                .map(|r| r.operation_timeout_ms)
                .unwrap_or(250),
        );

        Self {
            config: config.clone(),
            durable,
            volatile: MemoryCacheBackend::new(),
            durable_breaker: CircuitBreaker::new(
                "cache.durable".to_string(),
                CircuitBreakerConfig::for_cache(),
            ),
            operation_timeout,
            counters: CacheCounters::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Configured entry lifetime
    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    fn key(&self, fingerprint: &RequestFingerprint) -> String {
        format!("{}{}", self.config.key_prefix, fingerprint.as_str())
    }

    /// Run `operation` against the durable tier.
    ///
    /// `None` means the caller must use the volatile tier instead.
    async fn on_durable<T, F, Fut>(&self, op_name: &'static str, operation: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn CacheBackend>) -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let backend = Arc::clone(self.durable.as_ref()?);

        let Some(permit) = self.durable_breaker.try_acquire() else {
            self.record_fallback(op_name, &CacheError::ConnectionError("circuit open".into()));
            return None;
        };

        let attempt = async {
            if !backend.ping().await {
                return Err(CacheError::ConnectionError("ping failed".to_string()));
            }
            operation(Arc::clone(&backend)).await
        };

        let outcome = match tokio::time::timeout(self.operation_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "{op_name} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(value) => {
                permit.succeeded();
                Some(value)
            }
            Err(e) => {
                permit.failed();
                self.record_fallback(op_name, &e);
                None
            }
        }
    }

    fn record_fallback(&self, op_name: &'static str, error: &CacheError) {
        self.counters
            .fallback_operations
            .fetch_add(1, Ordering::Relaxed);
        warn!(
            operation = op_name,
            error = %error,
            "Durable cache tier unavailable, using in-memory fallback"
        );
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<CacheEntry> {
        match serde_json::from_slice::<CacheEntry>(bytes) {
            Ok(entry) if !entry.is_expired() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Look up the entry for `fingerprint`. Expired entries read as misses.
    pub async fn get(&self, fingerprint: &RequestFingerprint) -> Option<CacheEntry> {
        if !self.config.enabled {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let key = self.key(fingerprint);
        let key_ref = key.as_str();

        let durable_hit = self
            .on_durable("get", |backend| async move { backend.get(key_ref).await })
            .await
            .flatten()
            .and_then(|bytes| self.decode(&key, &bytes));

        // entries written during a durable outage live only in the volatile tier
        let volatile_hit = match self.volatile.get(&key).await {
            Ok(Some(bytes)) => self.decode(&key, &bytes),
            _ => None,
        };

        let entry = match (durable_hit, volatile_hit) {
            (Some(durable), Some(volatile)) => Some(newest(durable, volatile)),
            (durable, volatile) => durable.or(volatile),
        };

        match &entry {
            Some(_) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, "Cache hit");
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, "Cache miss");
            }
        }

        entry
    }

    /// Store `result` under `fingerprint`. Last writer wins.
    pub async fn set(&self, fingerprint: &RequestFingerprint, result: &CompositeResult, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            result: result.clone(),
            created_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        };

        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        let key = self.key(fingerprint);
        let key_ref = key.as_str();
        let payload = bytes.as_slice();

        let stored_durably = self
            .on_durable("set", |backend| async move { backend.set(key_ref, payload, ttl).await })
            .await
            .is_some();

        if stored_durably {
            let _ = self.volatile.delete(&key).await;
        } else if let Err(e) = self.volatile.set(&key, payload, ttl).await {
            warn!(fingerprint = %fingerprint, error = %e, "In-memory cache write failed");
            return;
        }

        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        debug!(
            fingerprint = %fingerprint,
            ttl_seconds = ttl.as_secs(),
            durable = stored_durably,
            "Cache set"
        );
    }

    /// Remove the entry for `fingerprint` from both tiers
    pub async fn delete(&self, fingerprint: &RequestFingerprint) {
        let key = self.key(fingerprint);
        let key_ref = key.as_str();

        self.on_durable("delete", |backend| async move { backend.delete(key_ref).await })
            .await;
        let _ = self.volatile.delete(&key).await;
    }

    /// Remove every entry under the configured prefix from both tiers
    pub async fn clear(&self) -> u64 {
        let prefix = self.config.key_prefix.as_str();

        let durable_removed = self
            .on_durable("clear", |backend| async move { backend.clear(prefix).await })
            .await
            .unwrap_or(0);
        let volatile_removed = self.volatile.clear(prefix).await.unwrap_or(0);

        let removed = durable_removed + volatile_removed;
        info!(removed = removed, "Response cache cleared");
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let prefix = self.config.key_prefix.as_str();

        let durable_size = self
            .on_durable("len", |backend| async move { backend.len(prefix).await })
            .await;

        let (backend, size) = match durable_size {
            Some(size) => ("durable", size),
            None => ("fallback", self.volatile.len(prefix).await.unwrap_or(0)),
        };

        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            enabled: self.config.enabled,
            hits,
            misses,
            sets: self.counters.sets.load(Ordering::Relaxed),
            size,
            backend: backend.to_string(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            fallback_operations: self.counters.fallback_operations.load(Ordering::Relaxed),
            durable_provider: self
                .durable
                .as_ref()
                .map(|b| b.provider_name().to_string()),
        }
    }
}

/// Last writer wins across tiers
fn newest(durable: CacheEntry, volatile: CacheEntry) -> CacheEntry {
    if volatile.created_at > durable.created_at {
        volatile
    } else {
        durable
    }
}

#[cfg(feature = "cache-redis")]
async fn connect_durable(redis_config: &crate::config::RedisConfig) -> Option<Arc<dyn CacheBackend>> {
    match super::providers::RedisCacheBackend::from_config(redis_config).await {
        Ok(backend) => {
            info!("Durable cache tier connected (redis)");
            Some(Arc::new(backend))
        }
        Err(e) => {
            warn!(
                error = %e,
                "Durable cache tier unavailable at startup, using in-memory cache"
            );
            None
        }
    }
}

#[cfg(not(feature = "cache-redis"))]
async fn connect_durable(_redis_config: &crate::config::RedisConfig) -> Option<Arc<dyn CacheBackend>> {
    warn!("Redis cache configured but the 'cache-redis' feature is not enabled, using in-memory cache");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recommendation, ScoreConfidence};
    use std::collections::BTreeMap;

    fn composite(score: f64) -> CompositeResult {
        CompositeResult {
            location: "austin, tx".to_string(),
            radius: 2.0,
            overall_score: score,
            category_scores: BTreeMap::new(),
            succeeded: vec!["demographics".to_string()],
            missing: vec![],
            partial: false,
            confidence: ScoreConfidence::High,
            recommendation: Recommendation::Good,
            computed_at: Utc::now(),
        }
    }

    fn fingerprint(s: &str) -> RequestFingerprint {
        crate::models::AnalysisRequest::new(s, 2.0, None)
            .unwrap()
            .fingerprint()
    }

    #[tokio::test]
    async fn test_volatile_roundtrip_and_stats() {
        let cache = ResponseCache::volatile(&CacheConfig::default());
        let fp = fingerprint("Austin, TX");

        assert!(cache.get(&fp).await.is_none());
        cache.set(&fp, &composite(71.5), cache.ttl()).await;

        let entry = cache.get(&fp).await.unwrap();
        assert_eq!(entry.result.overall_score, 71.5);
        assert_eq!(entry.fingerprint, fp);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.backend, "fallback");
        assert_eq!(stats.fallback_operations, 0);
        assert!(stats.durable_provider.is_none());
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = ResponseCache::volatile(&CacheConfig::default());
        let fp = fingerprint("Austin, TX");

        cache.set(&fp, &composite(10.0), cache.ttl()).await;
        cache.set(&fp, &composite(20.0), cache.ttl()).await;

        assert_eq!(cache.get(&fp).await.unwrap().result.overall_score, 20.0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::volatile(&CacheConfig::default());
        let fp = fingerprint("Austin, TX");

        cache.set(&fp, &composite(50.0), Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get(&fp).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = ResponseCache::volatile(&CacheConfig::default());
        let a = fingerprint("Austin, TX");
        let b = fingerprint("Denver, CO");

        cache.set(&a, &composite(1.0), cache.ttl()).await;
        cache.set(&b, &composite(2.0), cache.ttl()).await;

        cache.delete(&a).await;
        assert!(cache.get(&a).await.is_none());

        assert_eq!(cache.clear().await, 1);
        assert!(cache.get(&b).await.is_none());
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = ResponseCache::volatile(&config);
        let fp = fingerprint("Austin, TX");

        cache.set(&fp, &composite(50.0), cache.ttl()).await;
        assert!(cache.get(&fp).await.is_none());

        let stats = cache.stats().await;
        assert!(!stats.enabled);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_newest_entry_wins_across_tiers() {
        let older = CacheEntry {
            fingerprint: fingerprint("Austin, TX"),
            result: composite(10.0),
            created_at: Utc::now() - chrono::Duration::seconds(5),
            ttl_ms: 60_000,
        };
        let newer = CacheEntry {
            result: composite(20.0),
            created_at: Utc::now(),
            ..older.clone()
        };

        assert_eq!(newest(older.clone(), newer.clone()).result.overall_score, 20.0);
        assert_eq!(newest(newer, older).result.overall_score, 20.0);
    }

    #[test]
    fn test_entry_expiry() {
        let mut entry = CacheEntry {
            fingerprint: fingerprint("Austin, TX"),
            result: composite(1.0),
            created_at: Utc::now(),
            ttl_ms: 60_000,
        };
        assert!(!entry.is_expired());

        entry.created_at = Utc::now() - chrono::Duration::seconds(61);
        assert!(entry.is_expired());
    }
}
