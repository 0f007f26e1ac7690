use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{CacheError, CodeCache};

/// Compare-and-delete in one round trip.
const DELETE_IF_EQ: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Redis-backed cache.
///
/// Holds one multiplexed, auto-reconnecting connection that is cloned per
/// call. Every command is bounded by `op_timeout`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379`) and ping it.
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = bounded(op_timeout, ConnectionManager::new(client)).await??;
        let cache = Self { conn, op_timeout };
        let mut conn = cache.conn.clone();
        let _: String = bounded(op_timeout, redis::cmd("PING").query_async(&mut conn)).await??;
        debug!(redis_url, "redis cache connected");
        Ok(cache)
    }
}

async fn bounded<F, T>(limit: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CacheError::Timeout(limit))
}

#[async_trait]
impl CodeCache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let millis = ttl.as_millis().max(1) as u64;
        let _: () = bounded(
            self.op_timeout,
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(millis)
                .query_async(&mut conn),
        )
        .await??;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = bounded(
            self.op_timeout,
            redis::cmd("GET").arg(key).query_async(&mut conn),
        )
        .await??;
        Ok(value)
    }

    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(DELETE_IF_EQ);
        let removed: i64 = bounded(
            self.op_timeout,
            script.key(key).arg(value).invoke_async(&mut conn),
        )
        .await??;
        Ok(removed == 1)
    }
}
