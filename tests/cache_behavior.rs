use agentic_rag::cache::{CacheConfig, QueryCache, ResultCache};
use agentic_rag::ErrorKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn test_lru_scenario_evicts_least_recently_used() {
    let cache = ResultCache::new(2).expect("capacity 2 is valid");
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

#[tokio::test]
async fn test_ttl_scenario_expires_without_pressure() {
    let cache = ResultCache::new(10).unwrap();
    cache.put("A", "answer", Duration::from_millis(100)).unwrap();
    let before = cache.stats();
    assert_eq!(before.size, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.get("A"), None);
    let after = cache.stats();
    assert_eq!(after.misses, before.misses + 1);
    assert_eq!(after.size, before.size - 1);
    assert_eq!(after.expirations, 1);
}

#[test]
fn test_size_never_exceeds_capacity() {
    let cache = ResultCache::new(5).unwrap();
    for i in 0..100 {
        cache.put(format!("k{}", i), i, HOUR).unwrap();
        assert!(cache.len() <= 5);
    }
    // The survivors are exactly the five most recent inserts.
    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["k95", "k96", "k97", "k98", "k99"]);
    assert_eq!(cache.stats().evictions, 95);
}

#[test]
fn test_zero_ttl_is_rejected_and_cache_unchanged() {
    let cache = ResultCache::new(2).unwrap();
    cache.put("A", 1, HOUR).unwrap();
    let before = cache.stats();

    let err = cache.put("A", 2, Duration::ZERO).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = cache.put("B", 3, Duration::ZERO).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_eq!(cache.stats(), before);
    assert_eq!(cache.get("A"), Some(1));
    assert!(!cache.contains("B"));
}

#[test]
fn test_zero_capacity_is_rejected() {
    let err = ResultCache::<u8>::new(0).err().expect("capacity 0 must fail");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_concurrent_access_respects_capacity() {
    let cache = Arc::new(ResultCache::new(16).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("t{}-{}", t, i % 20);
                    cache.put(key.clone(), i, HOUR).unwrap();
                    let _ = cache.get(&key);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(cache.len() <= 16);
    let stats = cache.stats();
    assert_eq!(stats.inserts, 8 * 200);
    assert_eq!(stats.hits + stats.misses, 8 * 200);
}

#[test]
fn test_query_cache_fingerprints_normalized_queries() {
    let cache: QueryCache<String> = QueryCache::new(CacheConfig::new().with_max_size(10)).unwrap();
    let params = BTreeMap::from([("top_k".to_string(), "3".to_string())]);

    let key = cache.key_for("What is  MetaGPT?", &params);
    cache.put(&key, "a multi-agent framework".to_string()).unwrap();

    let same = cache.key_for("  what is metagpt?", &params);
    assert_eq!(cache.get(&same).as_deref(), Some("a multi-agent framework"));

    let deeper = BTreeMap::from([("top_k".to_string(), "5".to_string())]);
    assert_eq!(cache.get(&cache.key_for("What is MetaGPT?", &deeper)), None);
}

#[test]
fn test_disabled_query_cache_stores_nothing() {
    let cache: QueryCache<u32> = QueryCache::new(CacheConfig::new().with_enabled(false)).unwrap();
    let key = cache.key_for("q", &BTreeMap::new());
    cache.put(&key, 1).unwrap();
    assert!(!cache.is_enabled());
    assert_eq!(cache.get(&key), None);
    assert_eq!(cache.stats().size, 0);
}

#[test]
fn test_unbounded_ttl_is_stored_and_served() {
    let cache = ResultCache::new(4).unwrap();
    cache.put("A", 1, Duration::MAX).unwrap();
    cache.put("B", 2, Duration::from_secs(u64::MAX)).unwrap();
    assert_eq!(cache.get("A"), Some(1));
    assert_eq!(cache.get("B"), Some(2));
    assert_eq!(cache.purge_expired(), 0);
    assert_eq!(cache.len(), 2);
}
