//! Query metrics: counts, latency percentiles and cache hit rate.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Latency samples kept for percentile computation.
pub const DEFAULT_LATENCY_WINDOW: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub query_count: u64,
    pub error_count: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
}

pub struct MetricsCollector {
    latencies_ms: Mutex<VecDeque<f64>>,
    max_samples: usize,
    query_count: AtomicU64,
    error_count: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }

    pub fn with_window(max_samples: usize) -> Self {
        Self {
            latencies_ms: Mutex::new(VecDeque::new()),
            max_samples: max_samples.max(1),
            query_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn record_query(&self, latency: Duration, success: bool) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        let mut samples = self
            .latencies_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        samples.push_back(latency.as_secs_f64() * 1000.0);
        if samples.len() > self.max_samples {
            samples.pop_front();
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted: Vec<f64> = self
            .latencies_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let query_count = self.query_count.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;

        MetricsSnapshot {
            query_count,
            error_count,
            success_rate: if query_count == 0 {
                0.0
            } else {
                (query_count - error_count) as f64 / query_count as f64
            },
            avg_latency_ms: if sorted.is_empty() {
                0.0
            } else {
                sorted.iter().sum::<f64>() / sorted.len() as f64
            },
            p95_latency_ms: percentile(&sorted, 0.95),
            p99_latency_ms: percentile(&sorted, 0.99),
            cache_hits,
            cache_misses,
            cache_hit_rate: if cache_total == 0 {
                0.0
            } else {
                cache_hits as f64 / cache_total as f64
            },
        }
    }

    pub fn reset(&self) {
        self.latencies_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.query_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Index floor(n * p), clamped to the last sample.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_zeroed() {
        let m = MetricsCollector::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn percentiles_and_rates() {
        let m = MetricsCollector::new();
        for ms in 1..=100u64 {
            m.record_query(Duration::from_millis(ms), ms % 10 != 0);
        }
        m.record_cache_hit();
        m.record_cache_miss();
        m.record_cache_miss();
        m.record_cache_miss();

        let s = m.snapshot();
        assert_eq!(s.query_count, 100);
        assert_eq!(s.error_count, 10);
        assert!((s.success_rate - 0.9).abs() < 1e-9);
        assert!((s.avg_latency_ms - 50.5).abs() < 1e-6);
        assert!((s.p95_latency_ms - 96.0).abs() < 1e-6);
        assert!((s.p99_latency_ms - 100.0).abs() < 1e-6);
        assert!((s.cache_hit_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn window_drops_oldest_samples() {
        let m = MetricsCollector::with_window(2);
        m.record_query(Duration::from_millis(1000), true);
        m.record_query(Duration::from_millis(10), true);
        m.record_query(Duration::from_millis(20), true);
        let s = m.snapshot();
        assert_eq!(s.query_count, 3);
        assert!((s.avg_latency_ms - 15.0).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_everything() {
        let m = MetricsCollector::new();
        m.record_query(Duration::from_millis(5), false);
        m.record_cache_hit();
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
