//! Advanced Usage
//!
//! Demonstrates L2-to-L1 promotion on a cold read, the `get_or_load` pattern
//! standing in for a database lookup, and concurrent writes across distinct
//! keys.
//!
//! Run with: cargo run --example advanced_usage

use std::sync::Arc;
use std::time::Duration;
use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};

async fn fetch_from_database(id: u32) -> anyhow::Result<Option<serde_json::Value>> {
    println!("   fetching from database (expensive operation)...");
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(Some(serde_json::json!({ "product_id": id, "name": format!("Product {id}"), "price": 100 + id })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: Advanced Usage ===\n");

    let config = CacheConfig::default().with_namespace("demo_advanced");
    let cache = CacheSystemBuilder::new(config).build().await?;

    println!("=== Scenario 1: L2-to-L1 Promotion ===\n");

    // put_if_absent writes straight to the remote tier without touching L1,
    // simulating a key that arrived via another process.
    let data = serde_json::json!({ "message": "this data starts in L2 only" });
    cache.engine.put_if_absent("promotion_demo", &data, Some(Duration::from_secs(300))).await?;
    println!("Data stored in L2 only.\n");

    println!("First access (L1 miss, falls through to L2 and backfills L1):");
    let result1: CacheStatus<serde_json::Value> = cache.engine.get("promotion_demo").await?;
    println!("   {result1:?}\n");

    println!("Second access (now served from L1):");
    let result2: CacheStatus<serde_json::Value> = cache.engine.get("promotion_demo").await?;
    println!("   {result2:?}\n");

    println!("=== Scenario 2: Compute-on-Miss Pattern ===\n");

    println!("First call - cache miss, will compute:");
    let product1: CacheStatus<serde_json::Value> = cache
        .engine
        .get_or_load("product:42", None, |_key| fetch_from_database(42))
        .await?;
    println!("   {product1:?}\n");

    println!("Second call - cache hit, no computation:");
    let product2: CacheStatus<serde_json::Value> = cache
        .engine
        .get_or_load("product:42", None, |_key| async move {
            panic!("loader should not run on a cache hit")
        })
        .await?;
    println!("   {product2:?} (from cache, no DB call)\n");

    println!("=== Scenario 3: Concurrent Writes to Distinct Keys ===\n");

    let cache = Arc::new(cache);
    let mut handles = Vec::with_capacity(5);
    for i in 1..=5 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let data = serde_json::json!({ "worker_id": i, "data": format!("concurrent data from worker {i}") });
            cache.engine.put(&format!("concurrent:{i}"), &data, None).await
        }));
    }
    for handle in handles {
        handle.await??;
    }
    println!("5 concurrent writes completed.\n");

    for i in 1..=5 {
        let status: CacheStatus<serde_json::Value> = cache.engine.get(&format!("concurrent:{i}")).await?;
        if let CacheStatus::Found(value) = status {
            println!("   concurrent:{i} = {value}");
        }
    }

    use std::sync::atomic::Ordering;
    let stats = cache.engine.stats();
    println!("\n=== Final Engine Statistics ===");
    println!("Local hits:   {}", stats.local_hits.load(Ordering::Relaxed));
    println!("Local misses: {}", stats.local_misses.load(Ordering::Relaxed));
    println!("Remote hits:  {}", stats.remote_hits.load(Ordering::Relaxed));
    println!("Loads:        {}", stats.loads.load(Ordering::Relaxed));

    Ok(())
}
