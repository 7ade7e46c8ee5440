//! Cache Stampede Protection
//!
//! Demonstrates how `get_or_load` coalesces concurrent requests for the same
//! cold key into a single data-source load.
//!
//! Run with: cargo run --example stampede_protection

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};

async fn expensive_computation(
    worker_id: u32,
    load_count: Arc<AtomicU32>,
) -> anyhow::Result<Option<serde_json::Value>> {
    let n = load_count.fetch_add(1, Ordering::SeqCst) + 1;
    println!("  [load #{n}, triggered by worker {worker_id}] starting expensive computation...");
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("  [load #{n}] computation complete");

    Ok(Some(serde_json::json!({ "result": "computed_value", "worker_id": worker_id })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: Stampede Protection Demo ===\n");

    let config = CacheConfig::default().with_namespace("demo_stampede");
    let cache = Arc::new(CacheSystemBuilder::new(config).build().await?);
    let load_count = Arc::new(AtomicU32::new(0));

    println!("Scenario: 10 concurrent workers requesting the same cold key\n");

    let start = Instant::now();
    let mut handles = Vec::with_capacity(10);

    for i in 1..=10 {
        let cache = cache.clone();
        let load_count = load_count.clone();
        handles.push(tokio::spawn(async move {
            let worker_start = Instant::now();
            let result: anyhow::Result<CacheStatus<serde_json::Value>> = cache
                .engine
                .get_or_load("stampede_demo_key", None, move |_key| expensive_computation(i, load_count))
                .await
                .map_err(Into::into);
            println!("  [worker {i}] completed in {:?}", worker_start.elapsed());
            result
        }));
    }

    for handle in handles {
        handle.await??;
    }

    let total_elapsed = start.elapsed();

    println!("\n=== Results ===");
    println!("Total time: {total_elapsed:?}");
    println!("Without suppression this would take ~5000ms (10 workers x 500ms)");
    println!("Data-source loads actually executed: {}", load_count.load(Ordering::SeqCst));

    if load_count.load(Ordering::SeqCst) == 1 {
        println!("Stampede protection worked: only one load ran, the other nine joined it.");
    } else {
        println!("Warning: more than one load ran; suppression did not fully engage.");
    }

    Ok(())
}
