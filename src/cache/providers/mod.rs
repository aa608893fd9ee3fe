//! Cache tier implementations

pub mod memory;
#[cfg(feature = "cache-redis")]
pub mod redis;

pub use memory::MemoryCacheBackend;
#[cfg(feature = "cache-redis")]
pub use redis::RedisCacheBackend;
