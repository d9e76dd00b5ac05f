//! # Query Result Caching
//!
//! Memoizes answers to repeated queries so the agent/LLM layer is only called
//! on a miss.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResultCache`] | Bounded store with per-entry TTL and LRU eviction |
//! | [`QueryCache`] | Fingerprints queries and applies the configured TTL; can be disabled |
//! | [`CacheConfig`] | Enable flag, default TTL, capacity and key prefix |
//! | [`CacheKeyGenerator`] | SHA-256 fingerprint of normalized query text plus parameters |
//! | [`CacheStats`] | Hit/miss/eviction/expiration counters |
//!
//! ## Example
//!
//! ```rust
//! use agentic_rag::cache::ResultCache;
//! use std::time::Duration;
//!
//! let cache = ResultCache::new(2).unwrap();
//! cache.put("A", 1, Duration::from_secs(60)).unwrap();
//! cache.put("B", 2, Duration::from_secs(60)).unwrap();
//! cache.get("A");
//! cache.put("C", 3, Duration::from_secs(60)).unwrap();
//! assert!(cache.get("B").is_none());
//! ```
//!
//! Expiry is lazy: an expired entry is removed by the read that finds it (or
//! by [`ResultCache::purge_expired`]). Capacity pressure evicts strictly by
//! recency.

mod entry;
mod key;
mod manager;
mod store;

pub use entry::CacheEntry;
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, QueryCache};
pub use store::{CacheStats, ResultCache};
