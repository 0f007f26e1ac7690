//! Key/value cache with per-entry TTL.
//!
//! Only verification codes live here. [`RedisCache`] is the production
//! backend; [`MemoryCache`] serves tests and single-process runs.

mod memory;
mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),
}

/// Cache collaborator. Implementations must be safe for concurrent use.
#[async_trait]
pub trait CodeCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Atomically remove `key` if it holds a live `value`. Returns whether
    /// the entry was removed; any other value is left untouched.
    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool, CacheError>;
}
