//! Type-Safe Database Caching
//!
//! Demonstrates `get_or_load` as a cache-aside wrapper around a database
//! query, with full type safety through serde and no manual encode/decode.
//!
//! Run with: cargo run --example database_caching

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: String,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Product {
    id: i64,
    title: String,
    price: f64,
    stock: i32,
}

async fn fetch_user_from_db(user_id: i64) -> anyhow::Result<Option<User>> {
    println!("  simulating database query for user {user_id}");
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(Some(User {
        id: user_id,
        name: format!("User {user_id}"),
        email: format!("user{user_id}@example.com"),
        created_at: 1_704_326_400,
    }))
}

async fn fetch_product_from_db(product_id: i64) -> anyhow::Result<Option<Product>> {
    println!("  simulating database query for product {product_id}");
    tokio::time::sleep(Duration::from_millis(150)).await;
    Ok(Some(Product {
        id: product_id,
        title: format!("Product #{product_id}"),
        price: 99.99 + product_id as f64,
        stock: (product_id * 10) as i32,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Type-Safe Database Caching ===\n");

    let config = CacheConfig::default().with_namespace("demo_db_caching");
    let cache = CacheSystemBuilder::new(config).build().await?;

    println!("Example 1: first user request (cache miss, hits the database)");
    let start = std::time::Instant::now();
    let status: CacheStatus<User> = cache
        .engine
        .get_or_load("user:123", Some(Duration::from_secs(3600)), |_key| fetch_user_from_db(123))
        .await?;
    println!("   {status:?}");
    println!("   took {:?} (includes DB query + caching)\n", start.elapsed());

    println!("Example 2: second user request (cache hit, L1)");
    let start = std::time::Instant::now();
    let status: CacheStatus<User> = cache
        .engine
        .get_or_load("user:123", Some(Duration::from_secs(3600)), |_key| async move {
            panic!("loader should not run on a cache hit")
        })
        .await?;
    println!("   {status:?}");
    println!("   took {:?} (served from L1)\n", start.elapsed());

    println!("Example 3: different type (product) in the same cache instance");
    let status: CacheStatus<Product> = cache
        .engine
        .get_or_load("product:456", Some(Duration::from_secs(10_800)), |_key| fetch_product_from_db(456))
        .await?;
    println!("   {status:?}\n");

    println!("Example 4: concurrent requests for a cold key (stampede protection)");
    println!("   spawning 5 concurrent requests for user:999...");
    let cache = std::sync::Arc::new(cache);
    let handles: Vec<_> = (0..5)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let start = std::time::Instant::now();
                let status: CacheStatus<User> = cache
                    .engine
                    .get_or_load("user:999", None, |_key| fetch_user_from_db(999))
                    .await
                    .expect("get_or_load");
                println!("   request {} completed in {:?}", i + 1, start.elapsed());
                status
            })
        })
        .collect();

    for handle in handles {
        handle.await?;
    }
    println!("   only one database query ran; the other four joined it.\n");

    use std::sync::atomic::Ordering;
    let stats = cache.engine.stats();
    println!("=== Final Stats ===");
    println!("Local hits:  {}", stats.local_hits.load(Ordering::Relaxed));
    println!("Remote hits: {}", stats.remote_hits.load(Ordering::Relaxed));
    println!("Loads:       {}", stats.loads.load(Ordering::Relaxed));

    Ok(())
}
