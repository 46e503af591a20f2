//! Latency benchmarks for the prefix cache's hot paths against the budgets
//! named in the configuration table (`get` should resolve well under the
//! service's own `TIMEOUT_MS` budget; `put` should not stall a concurrent
//! reader for longer than a bucket-sized operation).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shellhint::cache::{CacheConfig, PrefixCache};

fn populated_cache(entries: usize) -> PrefixCache {
    let cache = PrefixCache::new(CacheConfig::default());
    for i in 0..entries {
        cache.put(&format!("git subcommand-{i}"));
    }
    cache
}

fn bench_get_hit(c: &mut Criterion) {
    let cache = populated_cache(500);
    c.bench_function("get_hit_warm_bucket", |b| {
        b.iter(|| cache.get("git s"));
    });
}

fn bench_get_miss(c: &mut Criterion) {
    let cache = populated_cache(500);
    c.bench_function("get_miss_unknown_prefix", |b| {
        b.iter(|| cache.get("zzz"));
    });
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    for bucket_count in [10usize, 500, 999] {
        group.bench_with_input(
            BenchmarkId::from_parameter(bucket_count),
            &bucket_count,
            |b, &bucket_count| {
                b.iter_batched(
                    || populated_cache(bucket_count),
                    |cache| cache.put("git status --short"),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_get_miss, bench_put);
criterion_main!(benches);
