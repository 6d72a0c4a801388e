//! Benchmarks for rate limiting algorithms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use throttle_core::{AlgorithmKind, MemoryStore, Quota, Store, Throttle};
use tokio::runtime::Runtime;

fn throttle(rt: &Runtime, kind: AlgorithmKind) -> Throttle {
    let quota = Quota::per_second(1000).with_burst(100);
    rt.block_on(async {
        Throttle::builder(Store::Memory(MemoryStore::new()))
            .algorithm(kind)
            .quota(quota)
            .build()
    })
}

fn bench_algorithms(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("algorithms");

    for (label, kind) in [
        ("gcra", AlgorithmKind::Gcra),
        ("token_bucket", AlgorithmKind::TokenBucket),
        ("fixed_window", AlgorithmKind::FixedWindow),
        ("sliding_window", AlgorithmKind::SlidingWindow),
        ("leaking_bucket", AlgorithmKind::LeakingBucket),
    ] {
        group.bench_function(label, |b| {
            let throttle = throttle(&rt, kind);
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let key = format!("{label}:{}", i % 100);
                rt.block_on(async { black_box(throttle.limit(Some(&key), None, None).await) })
            })
        });
    }

    group.finish();
}

fn bench_algorithm_comparison(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let quota = Quota::per_second(10000).with_burst(100);

    let mut group = c.benchmark_group("algorithm_comparison");

    for num_keys in [1, 10, 100, 1000].iter() {
        for (label, kind) in [("gcra", AlgorithmKind::Gcra), ("fixed_window", AlgorithmKind::FixedWindow)] {
            group.bench_with_input(BenchmarkId::new(label, num_keys), num_keys, |b, &num_keys| {
                let throttle = rt.block_on(async {
                    Throttle::builder(Store::Memory(MemoryStore::new()))
                        .algorithm(kind)
                        .quota(quota)
                        .build()
                });
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    let key = format!("k:{}", i % num_keys);
                    rt.block_on(async { black_box(throttle.limit(Some(&key), None, None).await) })
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_algorithm_comparison);
criterion_main!(benches);
