//! Redis cache tier
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections.
//! Requires the `cache-redis` feature flag.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheBackend;
use crate::config::RedisConfig;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Redis-backed durable tier
///
/// Uses SCAN for prefix deletion and counting to avoid blocking the server.
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheBackend {
    pub async fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        debug!(url = %redact_url(&config.url), "Redis cache backend connected");

        Ok(Self { connection_manager })
    }

    async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendError(format!("Redis SCAN failed: {}", e)))?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        let result: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {}", e)))?;

        debug!(key = key, hit = result.is_some(), "Redis GET");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis SETEX failed: {}", e)))?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {}", e)))?;

        Ok(())
    }

    async fn clear(&self, prefix: &str) -> CacheResult<u64> {
        let keys = self.scan_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection_manager.clone();
        let mut deleted = 0u64;
        for chunk in keys.chunks(100) {
            let count: u64 = redis::cmd("DEL")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendError(format!("Redis DEL (batch) failed: {}", e)))?;
            deleted += count;
        }

        debug!(prefix = prefix, deleted = deleted, "Redis prefix DEL");
        Ok(deleted)
    }

    async fn len(&self, prefix: &str) -> CacheResult<u64> {
        Ok(self.scan_prefix(prefix).await?.len() as u64)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.connection_manager.clone();
        matches!(
            redis::cmd("PING").query_async::<String>(&mut conn).await,
            Ok(pong) if pong == "PONG"
        )
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

/// Redact credentials from a Redis URL for logging
pub(crate) fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..=colon_pos];
            let suffix = &url[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}
