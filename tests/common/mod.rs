//! Shared test infrastructure for the integration suite.
//!
//! These tests exercise the real Redis remote tier (set `REDIS_URL`, or
//! rely on the `redis://127.0.0.1:6379` default) alongside the in-process
//! Moka local tier, matching the grounding crate's integration test style.

use anyhow::Result;
use tandem_cache::{CacheConfig, CacheSystemBuilder, TandemCache};

/// Redis URL from the environment, or the local default.
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// A unique key within the current test's namespace, to avoid collisions
/// between tests sharing a single Redis instance.
pub fn test_key(name: &str) -> String {
    format!("{name}_{}", rand::random::<u32>())
}

/// Build a `TandemCache` with both tiers live and a unique namespace, so
/// concurrent test runs never collide on the same Redis keys.
pub async fn setup_cache() -> Result<TandemCache> {
    let namespace = format!("it_{}", rand::random::<u32>());
    let config = CacheConfig::default().with_namespace(namespace).with_remote_connection_info(redis_url());
    Ok(CacheSystemBuilder::new(config).build().await?)
}

/// Build a `TandemCache` with refresh enabled on a short tick, for the
/// background-refresh scenarios.
pub async fn setup_cache_with_refresh(default_interval: std::time::Duration) -> Result<TandemCache> {
    let namespace = format!("it_refresh_{}", rand::random::<u32>());
    let mut config = CacheConfig::default().with_namespace(namespace).with_remote_connection_info(redis_url());
    config.refresh.enabled = true;
    config.refresh.default_interval = default_interval;
    config.refresh.tick_interval = std::time::Duration::from_millis(50);
    Ok(CacheSystemBuilder::new(config).build().await?)
}

/// Build a second `TandemCache` instance bound to the same namespace and
/// Redis URL as `other` but with its own independent local (L1) tier —
/// simulating a second process sharing the remote tier.
pub async fn sibling_cache(other: &TandemCache) -> Result<TandemCache> {
    let config = other.engine.config().clone();
    Ok(CacheSystemBuilder::new(config).build().await?)
}

pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
    }

    impl User {
        #[must_use]
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_unique_per_call() {
        let a = test_key("user");
        let b = test_key("user");
        assert_ne!(a, b);
        assert!(a.starts_with("user_"));
    }
}
