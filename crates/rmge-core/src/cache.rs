// ABOUTME: Generic LRU-with-TTL cache primitive shared by the embedding and query-expansion caches
// ABOUTME: Modeled on the teacher's in-memory CacheProvider: Arc<RwLock<LruCache>>, O(1) eviction

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Snapshot of hit/miss counters, exposed by every cache-backed component
/// (spec.md §4.1 "Cache statistics are exposed", SPEC_FULL.md §1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that missed or found an expired entry.
    pub misses: u64,
    /// Current number of live entries.
    pub size: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`; `0.0` when there have been no lookups yet.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// An LRU cache bounded by both entry count and a fixed TTL per entry.
///
/// Uses `Arc<RwLock<LruCache>>` so it can be cloned and shared across
/// concurrent requests the same way the teacher's `InMemoryCache` is shared
/// between request handlers and its background cleanup task (spec.md §5:
/// "reads and writes are serialized by the cache implementation").
#[derive(Clone)]
pub struct TtlLru<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    store: Arc<RwLock<LruCache<K, Entry<V>>>>,
    ttl: Duration,
    hits: Arc<std::sync::atomic::AtomicU64>,
    misses: Arc<std::sync::atomic::AtomicU64>,
}

impl<K, V> TtlLru<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given entry cap and TTL.
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            ttl,
            hits: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            misses: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    /// Fetch a live value, recording a hit or miss. Expired entries are
    /// evicted lazily on access and counted as a miss.
    pub async fn get(&self, key: &K) -> Option<V> {
        use std::sync::atomic::Ordering;
        let mut store = self.store.write().await;
        if let Some(entry) = store.get(key) {
            if entry.is_expired() {
                store.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or refresh a value, resetting its TTL.
    pub async fn put(&self, key: K, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.store.write().await.push(key, entry);
    }

    /// Current statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.store.read().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit() {
        let cache: TtlLru<String, u32> = TtlLru::new(10, Duration::from_secs(60));
        assert_eq!(cache.get(&"a".to_string()).await, None);
        cache.put("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_access() {
        let cache: TtlLru<String, u32> = TtlLru::new(10, Duration::from_millis(10));
        cache.put("a".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn respects_capacity_via_lru_eviction() {
        let cache: TtlLru<u32, u32> = TtlLru::new(2, Duration::from_secs(60));
        cache.put(1, 1).await;
        cache.put(2, 2).await;
        cache.put(3, 3).await; // evicts 1, the least-recently-used
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&2).await, Some(2));
        assert_eq!(cache.get(&3).await, Some(3));
    }
}
