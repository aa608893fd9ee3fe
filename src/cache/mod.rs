//! # Cache
//!
//! Two-tier response cache keyed by request fingerprint.
//!
//! ## Feature Flags
//!
//! - `cache-redis`: enables the Redis durable tier. Without it, or when Redis
//!   is unreachable, the in-process tier serves every call.

pub mod errors;
pub mod providers;
pub mod response_cache;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use providers::MemoryCacheBackend;
#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheBackend;
pub use response_cache::{CacheEntry, CacheStats, ResponseCache};
pub use traits::CacheBackend;
