//! In-process cache tier.
//!
//! Always reachable, so it serves as the fallback whenever the durable tier
//! is down. Expired values read as misses; they are swept on the first write
//! after the earliest expiry has passed, or on `clear`.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheBackend;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    /// `None` when the TTL does not fit in an `Instant`
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, StoredValue>,
    /// Earliest expiry among stored values
    next_expiry: Mutex<Option<Instant>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_expired(&self, now: Instant) {
        let mut next_expiry = self.next_expiry.lock();
        if !next_expiry.is_some_and(|at| now >= at) {
            return;
        }

        let before = self.entries.len();
        let mut earliest: Option<Instant> = None;
        self.entries.retain(|_, value| {
            if value.is_expired(now) {
                return false;
            }
            if let Some(at) = value.expires_at {
                earliest = Some(earliest.map_or(at, |e| e.min(at)));
            }
            true
        });
        *next_expiry = earliest;

        let swept = before.saturating_sub(self.entries.len());
        if swept > 0 {
            debug!(swept = swept, "Swept expired in-memory cache entries");
        }
    }

    fn track_expiry(&self, at: Instant) {
        let mut next_expiry = self.next_expiry.lock();
        *next_expiry = Some(next_expiry.map_or(at, |e| e.min(at)));
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|value| !value.is_expired(now))
            .map(|value| value.bytes.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        self.sweep_expired(now);

        let expires_at = now.checked_add(ttl);
        self.entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at,
            },
        );
        if let Some(at) = expires_at {
            self.track_expiry(at);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> CacheResult<u64> {
        let now = Instant::now();
        let mut removed = 0u64;
        self.entries.retain(|key, value| {
            if !key.starts_with(prefix) {
                return true;
            }
            if !value.is_expired(now) {
                removed += 1;
            }
            false
        });
        Ok(removed)
    }

    async fn len(&self, prefix: &str) -> CacheResult<u64> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.value().is_expired(now))
            .count() as u64)
    }

    async fn ping(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryCacheBackend::new();
        backend.set("analysis:a", b"one", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("analysis:a").await.unwrap(), Some(b"one".to_vec()));

        backend.set("analysis:a", b"two", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("analysis:a").await.unwrap(), Some(b"two".to_vec()));

        backend.delete("analysis:a").await.unwrap();
        assert_eq!(backend.get("analysis:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_reads_as_miss_and_is_swept_on_write() {
        let backend = MemoryCacheBackend::new();
        backend.set("analysis:a", b"x", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(backend.get("analysis:a").await.unwrap(), None);
        assert_eq!(backend.len("analysis:").await.unwrap(), 0);
        // still physically present until the next write
        assert_eq!(backend.entries.len(), 1);

        backend.set("analysis:b", b"y", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unexpired_entries_skip_the_sweep() {
        let backend = MemoryCacheBackend::new();
        backend.set("analysis:a", b"x", Duration::from_millis(10)).await.unwrap();
        backend.set("analysis:b", b"y", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.entries.len(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.set("analysis:c", b"z", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.entries.len(), 2);

        // only the long-lived entries remain, so the next expiry moved out
        let next = (*backend.next_expiry.lock()).unwrap();
        assert!(next > Instant::now() + Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_oversized_ttl_never_expires() {
        let backend = MemoryCacheBackend::new();
        backend.set("analysis:a", b"x", Duration::MAX).await.unwrap();

        assert_eq!(backend.get("analysis:a").await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(backend.len("analysis:").await.unwrap(), 1);
        assert!(backend.next_expiry.lock().is_none());
    }

    #[tokio::test]
    async fn test_clear_respects_prefix() {
        let backend = MemoryCacheBackend::new();
        let ttl = Duration::from_secs(60);
        backend.set("analysis:a", b"1", ttl).await.unwrap();
        backend.set("analysis:b", b"2", ttl).await.unwrap();
        backend.set("other:c", b"3", ttl).await.unwrap();

        assert_eq!(backend.clear("analysis:").await.unwrap(), 2);
        assert_eq!(backend.len("analysis:").await.unwrap(), 0);
        assert_eq!(backend.len("other:").await.unwrap(), 1);
    }
}
