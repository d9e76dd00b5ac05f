//! Benchmarks for the query cache path
//!
//! This benchmark measures:
//! - ResultCache get/put under a warm cache and under eviction pressure
//! - Query fingerprinting (normalize + SHA-256)
//! - Sentence-aware chunking throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use std::time::Duration;

use agentic_rag::cache::{CacheKeyGenerator, ResultCache};
use agentic_rag::documents::{Chunker, ChunkerConfig};

const TTL: Duration = Duration::from_secs(3600);

fn bench_result_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_cache");

    for capacity in [100usize, 1000, 10_000] {
        let cache = ResultCache::new(capacity).expect("capacity");
        for i in 0..capacity {
            cache.put(format!("key-{}", i), i, TTL).expect("put");
        }
        group.bench_with_input(BenchmarkId::new("get_hit", capacity), &capacity, |b, &cap| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % cap;
                black_box(cache.get(&format!("key-{}", i)))
            })
        });
    }

    group.bench_function("put_with_eviction", |b| {
        let cache = ResultCache::new(1000).expect("capacity");
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            cache.put(format!("k{}", i), i, TTL).expect("put");
        })
    });

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let params = BTreeMap::from([("top_k".to_string(), "3".to_string())]);
    let query = "  What are the   main contributions of the MetaGPT paper, and how do roles interact?  ";

    c.bench_function("fingerprint_query", |b| {
        b.iter(|| black_box(keys.fingerprint(black_box(query), &params)))
    });
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    let text = (0..5_000)
        .map(|i| if i % 12 == 11 { "end." } else { "word" })
        .collect::<Vec<_>>()
        .join(" ");
    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: 256,
        chunk_overlap: 32,
    })
    .expect("valid chunker config");

    group.throughput(Throughput::Elements(5_000));
    group.bench_function("split_text_5k_words", |b| {
        b.iter(|| black_box(chunker.split_text(black_box(&text))))
    });
    group.finish();
}

criterion_group!(benches, bench_result_cache, bench_fingerprint, bench_chunking);
criterion_main!(benches);
