//! Benchmarks comparing codecs and data sizes on the same read/write path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder, JsonCodec, TandemCache};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
    email: String,
}

impl User {
    fn new(id: u64) -> Self {
        Self { id, name: format!("User {id}"), email: format!("user{id}@example.com") }
    }
}

fn setup_cache(namespace: &str) -> (TandemCache<JsonCodec>, Runtime) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("failed to create runtime"));
    let cache = rt.block_on(async {
        let config = CacheConfig::default().with_namespace(namespace);
        CacheSystemBuilder::new(config)
            .build()
            .await
            .unwrap_or_else(|_| panic!("failed to build cache"))
    });
    (cache, rt)
}

fn bench_json_round_trip(c: &mut Criterion) {
    let (cache, rt) = setup_cache("bench_serde_json");

    let mut group = c.benchmark_group("serialization");

    group.bench_function("json_value", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:json:{}", rand::random::<u32>());
                let payload = serde_json::json!({
                    "id": 123,
                    "name": "Test User",
                    "email": "test@example.com"
                });

                cache.engine.put(&key, &payload, None).await.unwrap_or_else(|_| panic!("put"));
                let status: CacheStatus<serde_json::Value> =
                    cache.engine.get(&key).await.unwrap_or_else(|_| panic!("get"));
                black_box(status);
            });
        });
    });

    group.bench_function("typed_struct", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:typed:{}", rand::random::<u32>());
                let user = User::new(123);

                cache.engine.put(&key, &user, None).await.unwrap_or_else(|_| panic!("put"));
                let status: CacheStatus<User> =
                    cache.engine.get(&key).await.unwrap_or_else(|_| panic!("get"));
                black_box(status);
            });
        });
    });

    group.finish();
}

fn bench_data_sizes(c: &mut Criterion) {
    let (cache, rt) = setup_cache("bench_serde_sizes");

    let mut group = c.benchmark_group("data_size");
    group.measurement_time(Duration::from_secs(10));

    for size in &[100, 1024, 10240] {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:size:{}", rand::random::<u32>());
                    let data = serde_json::json!({ "data": "x".repeat(size) });

                    cache.engine.put(&key, &data, None).await.unwrap_or_else(|_| panic!("put"));
                    let status: CacheStatus<serde_json::Value> =
                        cache.engine.get(&key).await.unwrap_or_else(|_| panic!("get"));
                    black_box(status);
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_json_round_trip, bench_data_sizes);
criterion_main!(benches);
