//! Cache backend trait definition

use super::errors::CacheResult;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Byte-oriented key/value store with per-key TTL
///
/// Implemented by the durable tier (Redis) and the volatile in-process
/// tier. Backends must tolerate concurrent get/set on the same key; the last
/// writer wins.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Returns `Ok(None)` on miss or when the stored value has expired
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key starting with `prefix`, returning how many were removed
    async fn clear(&self, prefix: &str) -> CacheResult<u64>;

    /// Number of live keys starting with `prefix`
    async fn len(&self, prefix: &str) -> CacheResult<u64>;

    /// Cheap reachability probe used for durable/fallback routing
    async fn ping(&self) -> bool;

    fn provider_name(&self) -> &'static str;
}
