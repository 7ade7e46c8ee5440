//! Benchmark for cache-stampede suppression: 100 concurrent `get_or_load`
//! calls on the same cold key, behind a single simulated loader latency.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tandem_cache::{CacheConfig, CacheSystemBuilder, TandemCache};
use tokio::runtime::Runtime;

fn setup_cache() -> (TandemCache, Runtime) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("failed to create runtime"));
    let cache = rt.block_on(async {
        let config = CacheConfig::default().with_namespace("bench_stampede");
        CacheSystemBuilder::new(config)
            .build()
            .await
            .unwrap_or_else(|_| panic!("failed to build cache"))
    });
    (cache, rt)
}

fn bench_stampede_protection(c: &mut Criterion) {
    let (cache, rt) = setup_cache();
    let cache = Arc::new(cache);

    c.bench_function("stampede_100_concurrent", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:stampede:{}", rand::random::<u32>());
                let mut handles = Vec::with_capacity(100);

                for _ in 0..100 {
                    let cache = cache.clone();
                    let key = key.clone();
                    handles.push(tokio::spawn(async move {
                        cache
                            .engine
                            .get_or_load(&key, None, |_key| async {
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                Ok(Some(json!({ "computed": true })))
                            })
                            .await
                            .unwrap_or_else(|_| panic!("get_or_load"))
                    }));
                }

                for handle in handles {
                    black_box(handle.await.unwrap_or_else(|_| panic!("task failed")));
                }
            });
        });
    });
}

criterion_group!(benches, bench_stampede_protection);
criterion_main!(benches);
