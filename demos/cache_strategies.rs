//! TTL Patterns and Negative Caching
//!
//! The engine doesn't have named strategies (`ShortTerm`, `LongTerm`, ...);
//! callers pass an explicit `Option<Duration>` per write, or rely on
//! `CacheConfig::default_ttl` for L1. This demonstrates common patterns and
//! the negative-caching (tombstone) cycle.
//!
//! Run with: cargo run --example cache_strategies

use std::time::Duration;
use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: TTL Patterns ===\n");

    let config = CacheConfig::default().with_namespace("demo_strategies");
    let cache = CacheSystemBuilder::new(config).build().await?;

    println!("1. Real-time data (10s TTL) - rapidly changing values");
    let live_price = serde_json::json!({ "price": 42_000.50, "volume": 1_000_000 });
    cache.engine.put("live_price", &live_price, Some(Duration::from_secs(10))).await?;
    println!("   stored, expires in 10s\n");

    println!("2. Session data (5 min TTL) - frequently accessed");
    let session = serde_json::json!({ "user_id": 123, "token": "abc123" });
    cache.engine.put("session:123", &session, Some(Duration::from_secs(300))).await?;
    println!("   stored, expires in 5 minutes\n");

    println!("3. Reference data (1 hour TTL) - moderately stable");
    let catalog = serde_json::json!({ "category": "electronics", "items": ["laptop", "phone"] });
    cache.engine.put("catalog:electronics", &catalog, Some(Duration::from_secs(3600))).await?;
    println!("   stored, expires in 1 hour\n");

    println!("4. Default TTL (config.default_ttl) - no explicit TTL given");
    let generic = serde_json::json!({ "key": "value" });
    cache.engine.put("generic_key", &generic, None).await?;
    println!("   stored using the engine's configured default\n");

    println!("5. Negative caching - remember a miss so repeated lookups don't hit the data source");
    let status: CacheStatus<serde_json::Value> = cache
        .engine
        .get_or_load("nonexistent:42", None, |_key| async move { Ok(None) })
        .await?;
    println!("   first get_or_load: {status:?}");

    let status2: CacheStatus<serde_json::Value> = cache
        .engine
        .get_or_load("nonexistent:42", None, |_key| async move {
            panic!("loader should not run while the tombstone is live")
        })
        .await?;
    println!("   second get_or_load (tombstone hit, no loader call): {status2:?}\n");

    println!("=== Verifying stored keys ===\n");
    for key in ["live_price", "session:123", "catalog:electronics", "generic_key"] {
        let status: CacheStatus<serde_json::Value> = cache.engine.get(key).await?;
        println!("{key}: {status:?}");
    }

    Ok(())
}
