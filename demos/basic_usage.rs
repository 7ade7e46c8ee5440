//! Basic Usage
//!
//! Demonstrates the default two-tier setup (Moka L1 + Redis L2): put, get,
//! and a health check.
//!
//! Run with: cargo run --example basic_usage

use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
struct UserProfile {
    id: u64,
    name: String,
    email: String,
    role: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: Basic Usage ===\n");

    let config = CacheConfig::default().with_namespace("demo_basic");
    let cache = CacheSystemBuilder::new(config).build().await?;
    println!("Cache system ready (Moka L1 + Redis L2).\n");

    let reports = cache.health.check_all().await;
    for report in &reports {
        println!("  {} -> {:?} ({:?})", report.probe_name, report.status, report.latency);
    }
    println!();

    let user = UserProfile {
        id: 1,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        role: "admin".to_string(),
    };

    println!("Storing user profile (default TTL)...");
    cache.engine.put("user:1", &user, None).await?;

    println!("Retrieving user profile...");
    let status: CacheStatus<UserProfile> = cache.engine.get("user:1").await?;
    match status {
        CacheStatus::Found(found) => println!("Retrieved from cache: {found:?}"),
        other => println!("Unexpected status: {other:?}"),
    }

    use std::sync::atomic::Ordering;
    let stats = cache.engine.stats();
    println!("\n=== Engine Stats ===");
    println!("Local hits:  {}", stats.local_hits.load(Ordering::Relaxed));
    println!("Local miss:  {}", stats.local_misses.load(Ordering::Relaxed));
    println!("Remote hits: {}", stats.remote_hits.load(Ordering::Relaxed));
    println!("Loads:       {}", stats.loads.load(Ordering::Relaxed));

    Ok(())
}
