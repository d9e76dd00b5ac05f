//! Bounded result store with lazy TTL expiry and LRU eviction.

use super::entry::CacheEntry;
use crate::{Error, ErrorContext, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Counters accumulated since the cache was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    /// Entries currently held (including expired ones not yet read).
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe key/value cache with per-entry TTL and LRU eviction.
///
/// All operations take one mutex, so a `get` racing a `put` observes either
/// the old or the new entry, never a partial one. Expired entries are removed
/// when read; capacity pressure always evicts the least recently used entry,
/// expired or not.
pub struct ResultCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    capacity: usize,
    stats: AtomicStats,
}

impl<V: Clone> ResultCache<V> {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity).ok_or_else(|| {
            Error::invalid_argument(
                "cache capacity must be at least 1",
                ErrorContext::new()
                    .with_field_path("capacity")
                    .with_source("result_cache"),
            )
        })?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity,
            stats: AtomicStats::default(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value if present and unexpired, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.peek(key).map(|e| e.is_expired_at(now)) {
            Some(true) => {
                entries.pop(key);
                AtomicStats::bump(&self.stats.expirations);
                AtomicStats::bump(&self.stats.misses);
                debug!(key = %short(key), "cache entry expired");
                None
            }
            Some(false) => match entries.get_mut(key) {
                Some(entry) => {
                    entry.touch();
                    AtomicStats::bump(&self.stats.hits);
                    Some(entry.value.clone())
                }
                None => {
                    AtomicStats::bump(&self.stats.misses);
                    None
                }
            },
            None => {
                AtomicStats::bump(&self.stats.misses);
                None
            }
        }
    }

    /// Inserts or overwrites `key`. A new key at capacity evicts the LRU entry.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::invalid_argument(
                "ttl must be a positive duration",
                ErrorContext::new()
                    .with_field_path("ttl")
                    .with_source("result_cache"),
            ));
        }
        let key = key.into();
        let entry = CacheEntry::new(key.clone(), value, ttl);
        let mut entries = self.lock();
        if let Some((old_key, _)) = entries.push(key.clone(), entry) {
            if old_key != key {
                AtomicStats::bump(&self.stats.evictions);
                debug!(evicted = %short(&old_key), "cache eviction");
            }
        }
        AtomicStats::bump(&self.stats.inserts);
        Ok(())
    }

    /// Removes `key` if present. Returns whether an entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.lock().pop(key).is_some();
        if removed {
            AtomicStats::bump(&self.stats.invalidations);
        }
        removed
    }

    /// Presence check that does not affect recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        self.lock()
            .peek(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        self.stats
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            size,
            capacity: self.capacity,
        }
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ErrorKind;
    use std::sync::Arc;
    use std::thread;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ResultCache::<u32>::new(0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = ResultCache::new(2).unwrap();
        cache.put("A", 1, HOUR).unwrap();
        cache.put("B", 2, HOUR).unwrap();
        assert_eq!(cache.get("A"), Some(1));
        cache.put("C", 3, HOUR).unwrap();

        assert_eq!(cache.get("B"), None);
        assert_eq!(cache.get("A"), Some(1));
        assert_eq!(cache.get("C"), Some(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let cache = ResultCache::new(3).unwrap();
        for i in 0..20 {
            cache.put(format!("k{i}"), i, HOUR).unwrap();
            assert!(cache.len() <= 3);
        }
        // the three most recent survive, newest first
        assert_eq!(cache.keys(), vec!["k19", "k18", "k17"]);
        assert_eq!(cache.stats().evictions, 17);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let cache = ResultCache::new(2).unwrap();
        cache.put("A", 1, HOUR).unwrap();
        cache.put("B", 2, HOUR).unwrap();
        cache.put("A", 10, HOUR).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get("A"), Some(10));
        // overwrite made A most recent, so B goes next
        cache.put("C", 3, HOUR).unwrap();
        assert!(!cache.contains("B"));
    }

    #[test]
    fn zero_ttl_leaves_cache_unchanged() {
        let cache = ResultCache::new(2).unwrap();
        cache.put("A", 1, HOUR).unwrap();
        let before = cache.stats();
        let err = cache.put("A", 99, Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(cache.stats(), before);
        assert_eq!(cache.get("A"), Some(1));
    }

    #[test]
    fn expired_entry_is_absent_and_removed() {
        let cache = ResultCache::new(4).unwrap();
        cache.put("A", 1, Duration::from_millis(100)).unwrap();
        cache.put("B", 2, HOUR).unwrap();
        let before = cache.stats();

        thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get("A"), None);

        let after = cache.stats();
        assert_eq!(after.misses, before.misses + 1);
        assert_eq!(after.size, before.size - 1);
        assert_eq!(after.expirations, 1);
    }

    #[test]
    fn invalidate_is_noop_for_missing_keys() {
        let cache = ResultCache::new(2).unwrap();
        cache.put("A", 1, HOUR).unwrap();
        assert!(cache.invalidate("A"));
        assert!(!cache.invalidate("A"));
        assert!(!cache.invalidate("nope"));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn purge_expired_counts_removed() {
        let cache = ResultCache::new(4).unwrap();
        cache.put("a", 1, Duration::from_millis(20)).unwrap();
        cache.put("b", 2, Duration::from_millis(20)).unwrap();
        cache.put("c", 3, HOUR).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.keys(), vec!["c"]);
    }

    #[test]
    fn hit_and_miss_counters() {
        let cache = ResultCache::new(10).unwrap();
        cache.put("key1", "value1", HOUR).unwrap();
        cache.get("key1");
        cache.get("key2");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[test]
    fn concurrent_access_keeps_bound() {
        let cache = Arc::new(ResultCache::new(16).unwrap());
        let mut handles = vec![];
        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("t{t}-{}", i % 32);
                    cache.put(key.clone(), i, HOUR).unwrap();
                    let _ = cache.get(&key);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let stats = cache.stats();
        assert!(stats.size <= 16);
        assert_eq!(stats.inserts, 8 * 200);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
    }
}
