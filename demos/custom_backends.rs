//! Custom Backends
//!
//! Demonstrates implementing the engine's [`LocalStore`] and [`RemoteStore`]
//! collaborator traits from scratch, and wiring them in through
//! `CacheSystemBuilder::with_local`/`with_remote` in place of the default
//! Moka/Redis backends.
//!
//! Run with: cargo run --example custom_backends

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tandem_cache::{CacheConfig, CacheResult, CacheStatus, CacheSystemBuilder, LocalStore, RemoteStore, Slot};

/// An in-process L1 backed by a plain `HashMap`, for when Moka's eviction
/// machinery is more than a caller needs.
struct HashMapLocalStore {
    store: RwLock<HashMap<String, (Slot, Instant)>>,
}

impl HashMapLocalStore {
    fn new() -> Self {
        Self { store: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl LocalStore for HashMapLocalStore {
    async fn try_get(&self, full_key: &str) -> Option<Slot> {
        let store = self.store.read().expect("lock poisoned");
        store.get(full_key).and_then(|(slot, expiry)| {
            if *expiry > Instant::now() {
                Some(slot.clone())
            } else {
                None
            }
        })
    }

    async fn set(&self, full_key: &str, value: Slot, ttl: Duration) {
        let mut store = self.store.write().expect("lock poisoned");
        store.insert(full_key.to_string(), (value, Instant::now() + ttl));
    }

    async fn remove(&self, full_key: &str) {
        let mut store = self.store.write().expect("lock poisoned");
        store.remove(full_key);
    }

    fn name(&self) -> &'static str {
        "hashmap-local"
    }
}

/// An in-process stand-in for a remote store, so this demo runs without a
/// real Redis instance. Locks are modeled as plain map entries; there is no
/// cross-process guarantee here, only the same call surface the engine uses.
struct InMemoryRemoteStore {
    values: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
    locks: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryRemoteStore {
    fn new() -> Self {
        Self { values: RwLock::new(HashMap::new()), locks: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, full_key: &str) -> CacheResult<Option<Vec<u8>>> {
        let values = self.values.read().expect("lock poisoned");
        Ok(values.get(full_key).filter(|(_, expiry)| *expiry > Instant::now()).map(|(wire, _)| wire.clone()))
    }

    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut values = self.values.write().expect("lock poisoned");
        values.insert(full_key.to_string(), (wire.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut values = self.values.write().expect("lock poisoned");
        let occupied = values.get(full_key).is_some_and(|(_, expiry)| *expiry > Instant::now());
        if occupied {
            return Ok(false);
        }
        values.insert(full_key.to_string(), (wire.to_vec(), Instant::now() + ttl));
        Ok(true)
    }

    async fn delete(&self, full_key: &str) -> CacheResult<bool> {
        let mut values = self.values.write().expect("lock poisoned");
        Ok(values.remove(full_key).is_some())
    }

    async fn multi_get(&self, full_keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        let values = self.values.read().expect("lock poisoned");
        Ok(full_keys
            .iter()
            .map(|key| values.get(key).filter(|(_, expiry)| *expiry > Instant::now()).map(|(wire, _)| wire.clone()))
            .collect())
    }

    async fn multi_delete(&self, full_keys: &[String]) -> CacheResult<usize> {
        let mut values = self.values.write().expect("lock poisoned");
        Ok(full_keys.iter().filter(|key| values.remove(*key).is_some()).count())
    }

    async fn ping(&self) -> CacheResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration) -> CacheResult<bool> {
        let mut locks = self.locks.write().expect("lock poisoned");
        let held = locks.get(lock_key).is_some_and(|(_, expiry)| *expiry > Instant::now());
        if held {
            return Ok(false);
        }
        locks.insert(lock_key.to_string(), (token.to_string(), Instant::now() + guard));
        Ok(true)
    }

    async fn release_lock(&self, lock_key: &str, token: &str) -> CacheResult<bool> {
        let mut locks = self.locks.write().expect("lock poisoned");
        if locks.get(lock_key).is_some_and(|(held_token, _)| held_token == token) {
            locks.remove(lock_key);
            return Ok(true);
        }
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "in-memory-remote"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Tandem Cache: Custom Backends ===\n");

    let config = CacheConfig::default().with_namespace("demo_custom_backends");
    let cache = CacheSystemBuilder::new(config)
        .with_local(Arc::new(HashMapLocalStore::new()))
        .with_remote(Arc::new(InMemoryRemoteStore::new()))
        .build()
        .await?;

    println!("Built a cache system with a HashMap L1 and an in-memory L2 stand-in.\n");

    let payload = serde_json::json!({ "user": "alice", "score": 100 });
    cache.engine.put("user:alice", &payload, None).await?;

    let status: CacheStatus<serde_json::Value> = cache.engine.get("user:alice").await?;
    println!("Retrieved from custom backends: {status:?}");

    Ok(())
}
