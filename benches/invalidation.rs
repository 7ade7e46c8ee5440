//! Benchmarks for invalidation and write-through update paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_cache::{CacheConfig, CacheSystemBuilder, TandemCache};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: u64,
    value: String,
}

fn setup_cache() -> (TandemCache, Runtime) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("failed to create runtime"));
    let cache = rt.block_on(async {
        let config = CacheConfig::default().with_namespace("bench_invalidation");
        CacheSystemBuilder::new(config)
            .build()
            .await
            .unwrap_or_else(|_| panic!("failed to build cache"))
    });
    (cache, rt)
}

fn bench_invalidate_single_key(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    rt.block_on(async {
        for i in 0..100 {
            let key = format!("bench:inv:{i}");
            cache
                .engine
                .put(&key, &Record { id: i, value: "x".to_string() }, None)
                .await
                .unwrap_or_else(|_| panic!("put"));
        }
    });

    c.bench_function("invalidate_single_key", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:inv:{}", rand::random::<u8>() % 100);
                black_box(cache.engine.invalidate(&key).await.unwrap_or_else(|_| panic!("invalidate")));
            });
        });
    });
}

fn bench_update(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    rt.block_on(async {
        for i in 0..100 {
            let key = format!("bench:upd:{i}");
            cache
                .engine
                .put(&key, &Record { id: i, value: "x".to_string() }, None)
                .await
                .unwrap_or_else(|_| panic!("put"));
        }
    });

    c.bench_function("update", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:upd:{}", rand::random::<u8>() % 100);
                let new_value = Record { id: 999, value: "updated".to_string() };
                black_box(
                    cache
                        .engine
                        .update(&key, new_value, |_key, _value| async move { Ok(()) })
                        .await
                        .unwrap_or_else(|_| panic!("update")),
                );
            });
        });
    });
}

fn bench_put_if_absent_contended(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    c.bench_function("put_if_absent_on_existing_key", |b| {
        let key = "bench:absent:shared".to_string();
        rt.block_on(async {
            cache
                .engine
                .put_if_absent(&key, &Record { id: 1, value: "first".to_string() }, Some(Duration::from_secs(60)))
                .await
                .unwrap_or_else(|_| panic!("seed put_if_absent"));
        });

        b.iter(|| {
            rt.block_on(async {
                black_box(
                    cache
                        .engine
                        .put_if_absent(&key, &Record { id: 2, value: "contender".to_string() }, Some(Duration::from_secs(60)))
                        .await
                        .unwrap_or_else(|_| panic!("put_if_absent")),
                );
            });
        });
    });
}

criterion_group!(benches, bench_invalidate_single_key, bench_update, bench_put_if_absent_contended);
criterion_main!(benches);
