//! In-process TTL cache with bounded capacity.
//!
//! Backs the tenant resolver's binding and usage-stats caches. Reads take
//! a shared lock only; the last-access stamp lives in an atomic inside
//! each entry so concurrent readers never serialize. When an insert would
//! exceed capacity, expired entries are dropped first and then the
//! least-recently-accessed entry is evicted. A background sweeper removes
//! expired entries on a fixed interval.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

struct Entry<V> {
    value: V,
    expires_at: Instant,
    // Millis since the cache was created; updated on every read.
    last_accessed: AtomicU64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    max_entries: usize,
    ttl: Duration,
    epoch: Instant,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
            epoch: Instant::now(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn elapsed_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Look up a live entry. Expired entries are treated as misses and
    /// left for the sweeper or the next insert to reclaim.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = Instant::now();
        let entries = self.entries.read().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry
                    .last_accessed
                    .store(self.elapsed_millis(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert with the cache's TTL, evicting if the cache is full.
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| !e.is_expired(now));
        }
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            // Still full after dropping expired entries: evict the
            // least-recently-accessed one.
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                last_accessed: AtomicU64::new(self.elapsed_millis()),
            },
        );
    }

    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Spawn the periodic sweeper for a shared cache. The task exits when the
/// token is cancelled.
pub fn spawn_sweeper<K, V>(
    cache: Arc<TtlCache<K, V>>,
    interval: Duration,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "cache sweeper removed expired entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_inserted_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache: TtlCache<String, u32> = TtlCache::new(10, Duration::from_millis(10));
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let cache: TtlCache<String, u32> = TtlCache::new(10, Duration::from_millis(10));
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(20));
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_lru_eviction_on_full_insert() {
        let cache: TtlCache<String, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(2));
        // Touch "a" so "b" becomes the least recently accessed.
        assert_eq!(cache.get("a"), Some(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinserting_existing_key_does_not_evict() {
        let cache: TtlCache<String, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("a".to_string(), 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_concurrent_readers() {
        let cache: Arc<TtlCache<u32, u32>> = Arc::new(TtlCache::new(100, Duration::from_secs(60)));
        for i in 0..100 {
            cache.insert(i, i * 2);
        }
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        assert_eq!(cache.get(&i), Some(i * 2));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.stats().hits, 800);
    }

    #[tokio::test]
    async fn test_sweeper_purges_in_background() {
        let cache: Arc<TtlCache<String, u32>> =
            Arc::new(TtlCache::new(10, Duration::from_millis(10)));
        cache.insert("a".to_string(), 1);
        let token = CancellationToken::new();
        let handle = spawn_sweeper(cache.clone(), Duration::from_millis(20), token.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len(), 0);
        token.cancel();
        handle.await.unwrap();
    }
}
