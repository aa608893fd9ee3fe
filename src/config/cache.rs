use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When disabled every lookup is a miss and writes are dropped
    pub enabled: bool,

    /// Lifetime of a cached composite result
    pub ttl_seconds: u64,

    /// Prefix prepended to every fingerprint to form the backend key
    pub key_prefix: String,

    /// Durable tier. Absent means the volatile tier serves every call.
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 24 * 60 * 60,
            key_prefix: "analysis:".to_string(),
            redis: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Upper bound on a single durable-tier round trip before falling back
    pub operation_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            operation_timeout_ms: 250,
        }
    }
}
