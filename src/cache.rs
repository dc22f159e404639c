use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Cached value plus access metadata.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    #[allow(dead_code)]
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache hit/miss/eviction counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

struct CacheInner<T> {
    map: HashMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded TTL cache with least-recently-accessed eviction.
///
/// An expired entry is never returned from a read; it is dropped on the
/// spot. The lock guards map operations only.
pub struct TtlCache<T> {
    inner: Mutex<CacheInner<T>>,
    max_size: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            max_size,
        }
    }

    /// Return the value if present and unexpired, updating access metadata.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        match inner.map.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count += 1;
                entry.last_accessed = now;
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            Some(_) => {
                inner.map.remove(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a value with the given TTL, evicting the least-recently-accessed
    /// entry first when a new key would exceed capacity.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if inner.map.len() >= self.max_size && !inner.map.contains_key(&key) {
            if let Some(lru_key) = inner
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&lru_key);
                inner.evictions += 1;
                debug!("evicted least-recently-accessed cache entry {lru_key}");
            }
        }

        inner.map.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                access_count: 0,
                last_accessed: now,
            },
        );
    }

    /// Purge expired entries regardless of access pattern. Returns the number
    /// removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let before = inner.map.len();
        inner.map.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.map.len();
        if removed > 0 {
            debug!("swept {removed} expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            hit_rate: if total > 0 {
                inner.hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn get_returns_value_until_expiry() {
        let cache = TtlCache::new(10);
        cache.set("k", 1u32, Duration::from_secs(60));

        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_boundary_is_inclusive() {
        let cache = TtlCache::new(10);
        cache.set("k", 1u32, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(60)).await;
        // now == expires_at counts as expired
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_least_recently_accessed() {
        let cache = TtlCache::new(2);
        cache.set("a", 1u32, Duration::from_secs(600));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("b", 2u32, Duration::from_secs(600));
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touch "a" so "b" becomes the LRU entry.
        assert_eq!(cache.get("a"), Some(1));
        tokio::time::advance(Duration::from_secs(1)).await;

        cache.set("c", 3u32, Duration::from_secs(600));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn overwriting_existing_key_does_not_evict() {
        let cache = TtlCache::new(2);
        cache.set("a", 1u32, Duration::from_secs(600));
        cache.set("b", 2u32, Duration::from_secs(600));
        cache.set("a", 9u32, Duration::from_secs(600));

        assert_eq!(cache.get("a"), Some(9));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_expired_only() {
        let cache = TtlCache::new(10);
        cache.set("short", 1u32, Duration::from_secs(10));
        cache.set("long", 2u32, Duration::from_secs(600));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_track_hits_and_misses() {
        let cache = TtlCache::new(10);
        cache.set("k", 1u32, Duration::from_secs(60));
        let _ = cache.get("k");
        let _ = cache.get("k");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
