//! Built-in Backends
//!
//! Demonstrates swapping the local (L1) tier between the two backends this
//! crate ships: `MokaLocalStore` (default, size-bounded with automatic
//! eviction) and `DashMapLocalStore` (unbounded, simplest possible
//! semantics).
//!
//! Run with: cargo run --example builtin_backends

use std::sync::Arc;
use tandem_cache::{
    CacheConfig, CacheStatus, CacheSystemBuilder, DashMapLocalStore, HookRegistry, LocalStoreConfig,
    MokaLocalStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: Built-in Backends ===\n");

    println!("Example 1: DashMapLocalStore as L1\n");
    demo_dashmap_backend().await?;

    println!("\nExample 2: MokaLocalStore with a small capacity, to show eviction\n");
    demo_moka_backend().await?;

    Ok(())
}

async fn demo_dashmap_backend() -> anyhow::Result<()> {
    let hooks = Arc::new(HookRegistry::new());
    let dashmap_l1 = Arc::new(DashMapLocalStore::new(hooks));

    let config = CacheConfig::default().with_namespace("demo_dashmap");
    let cache = CacheSystemBuilder::new(config).with_local(dashmap_l1).build().await?;

    let payload = serde_json::json!({ "user": "bob", "role": "admin" });
    cache.engine.put("user:bob", &payload, None).await?;

    let status: CacheStatus<serde_json::Value> = cache.engine.get("user:bob").await?;
    println!("Retrieved from DashMapLocalStore: {status:?}");
    Ok(())
}

async fn demo_moka_backend() -> anyhow::Result<()> {
    let hooks = Arc::new(HookRegistry::new());
    let moka_l1 = Arc::new(MokaLocalStore::new(LocalStoreConfig { max_capacity: 4 }, hooks));

    let config = CacheConfig::default().with_namespace("demo_moka_small");
    let cache = CacheSystemBuilder::new(config).with_local(moka_l1).build().await?;

    for i in 0..8 {
        let payload = serde_json::json!({ "i": i });
        cache.engine.put(&format!("key:{i}"), &payload, None).await?;
    }

    println!("Wrote 8 keys into a capacity-4 Moka store; earlier keys may have been evicted:");
    for i in 0..8 {
        let status: CacheStatus<serde_json::Value> = cache.engine.get(&format!("key:{i}")).await?;
        println!("   key:{i} -> {status:?}");
    }

    Ok(())
}
