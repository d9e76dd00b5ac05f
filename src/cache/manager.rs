//! Query cache manager.

use super::key::{CacheKey, CacheKeyGenerator};
use super::store::{CacheStats, ResultCache};
use crate::Result;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub max_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            max_size: 1000,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Query-level cache: fingerprints queries and memoizes their responses.
///
/// A disabled cache never stores anything and reports only misses.
pub struct QueryCache<V> {
    config: CacheConfig,
    keys: CacheKeyGenerator,
    store: Option<ResultCache<V>>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let store = if config.enabled {
            Some(ResultCache::new(config.max_size)?)
        } else {
            None
        };
        info!(
            enabled = config.enabled,
            max_size = config.max_size,
            ttl_secs = config.default_ttl.as_secs(),
            "query cache initialized"
        );
        Ok(Self {
            config,
            keys: CacheKeyGenerator::new(),
            store,
        })
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key_for(&self, query: &str, params: &BTreeMap<String, String>) -> CacheKey {
        let key = self.keys.fingerprint(query, params);
        match self.config.key_prefix {
            Some(ref p) => CacheKey {
                hash: format!("{}:{}", p, key.hash),
                normalized_query: key.normalized_query,
            },
            None => key,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let store = self.store.as_ref()?;
        let hit = store.get(key.as_str());
        debug!(
            hit = hit.is_some(),
            query = %preview(&key.normalized_query),
            "query cache lookup"
        );
        hit
    }

    pub fn put(&self, key: &CacheKey, value: V) -> Result<()> {
        self.put_with_ttl(key, value, self.config.default_ttl)
    }

    pub fn put_with_ttl(&self, key: &CacheKey, value: V, ttl: Duration) -> Result<()> {
        match self.store {
            Some(ref store) => store.put(key.as_str(), value, ttl),
            None => Ok(()),
        }
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.store
            .as_ref()
            .map(|s| s.invalidate(key.as_str()))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Some(ref store) = self.store {
            store.clear();
            info!("query cache cleared");
        }
    }

    /// Counters of the underlying store; all zero when disabled.
    pub fn stats(&self) -> CacheStats {
        self.store
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default()
    }
}

fn preview(query: &str) -> &str {
    match query.char_indices().nth(50) {
        Some((idx, _)) => &query[..idx],
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = QueryCache::new(CacheConfig::new().with_enabled(false)).unwrap();
        let key = cache.key_for("query1", &BTreeMap::new());
        cache.put(&key, "result1".to_string()).unwrap();
        assert!(cache.get(&key).is_none());
        assert!(!cache.is_enabled());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn enabled_cache_round_trips() {
        let cache = QueryCache::new(CacheConfig::new()).unwrap();
        let key = cache.key_for("query1", &BTreeMap::new());
        cache.put(&key, "result1".to_string()).unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("result1"));
        assert!(cache.invalidate(&key));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn prefix_is_applied() {
        let cache: QueryCache<u8> =
            QueryCache::new(CacheConfig::new().with_key_prefix("docs-v1")).unwrap();
        let key = cache.key_for("q", &BTreeMap::new());
        assert!(key.hash.starts_with("docs-v1:"));
    }

    #[test]
    fn invalid_max_size_fails_only_when_enabled() {
        assert!(QueryCache::<u8>::new(CacheConfig::new().with_max_size(0)).is_err());
        assert!(QueryCache::<u8>::new(
            CacheConfig::new().with_max_size(0).with_enabled(false)
        )
        .is_ok());
    }
}
