//! Verifies that engine operations emit `tracing` spans/events end to end.
//!
//! Run with: RUST_LOG=debug cargo run --example tracing_demo

use tandem_cache::{CacheConfig, CacheSystemBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .init();

    tracing::info!("starting tracing verification");

    let config = CacheConfig::default().with_namespace("demo_tracing");
    let cache = CacheSystemBuilder::new(config).build().await?;

    cache.engine.put("test_key", &serde_json::json!("value"), None).await?;

    tracing::info!("operation complete");
    Ok(())
}
