use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheError, CodeCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process cache backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl CodeCache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let live = self
            .entries
            .get(key)
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.value.clone());
        Ok(live)
    }

    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, e| e.value == value && now < e.expires_at);
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let cache = MemoryCache::new();
        assert!(cache.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let cache = MemoryCache::new();
        cache.set("k", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_missing() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        cache.cleanup();
        assert!(cache.entries.is_empty());
    }

    #[tokio::test]
    async fn delete_if_eq_only_removes_matching_value() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert!(!cache.delete_if_eq("k", "other").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.delete_if_eq("k", "v").await.unwrap());
        assert!(!cache.delete_if_eq("k", "v").await.unwrap());
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_if_eq_ignores_expired_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.delete_if_eq("k", "v").await.unwrap());
    }
}
