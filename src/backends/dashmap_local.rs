//! `DashMap`-backed local store — an alternate, simpler L1 backend.
//!
//! Grounded in the grounding crate's `backends/dashmap_cache.rs`, kept
//! close to verbatim (it was already `Vec<u8>`-shaped); rewritten against
//! [`Slot`] and wired to [`HookRegistry`] the same way
//! [`crate::backends::local::MokaLocalStore`] is. Demonstrates that the
//! local tier is a capability set (spec §9), not tied to any one crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::hooks::{EvictionReason, HookRegistry};
use crate::status::Slot;
use crate::traits::LocalStore;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Slot,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Simple concurrent local store using `DashMap`.
///
/// **Use case**: educational reference, or workloads that want full
/// control over eviction without moka's capacity-based LRU. No automatic
/// eviction policy — call [`DashMapLocalStore::cleanup_expired`]
/// periodically if unbounded growth from stale entries is a concern.
pub struct DashMapLocalStore {
    map: Arc<DashMap<String, CacheEntry>>,
    hooks: Arc<HookRegistry>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl DashMapLocalStore {
    #[must_use]
    pub fn new(hooks: Arc<HookRegistry>) -> Self {
        info!("initializing local (DashMap) store");
        Self {
            map: Arc::new(DashMap::new()),
            hooks,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    /// Remove expired entries, firing the eviction hook for each. Returns
    /// the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut expired_keys = Vec::new();
        self.map.retain(|key, entry| {
            if entry.is_expired() {
                expired_keys.push(key.clone());
                false
            } else {
                true
            }
        });
        for key in &expired_keys {
            self.hooks.fire_eviction(key, EvictionReason::Expired);
        }
        if !expired_keys.is_empty() {
            debug!(count = expired_keys.len(), "local store (DashMap): cleaned up expired entries");
        }
        expired_keys.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl LocalStore for DashMapLocalStore {
    async fn try_get(&self, full_key: &str) -> Option<Slot> {
        let expired = match self.map.get(full_key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if expired {
            self.map.remove(full_key);
            self.hooks.fire_eviction(full_key, EvictionReason::Expired);
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    async fn set(&self, full_key: &str, value: Slot, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let replaced = self.map.insert(full_key.to_string(), entry).is_some();
        self.sets.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.hooks.fire_eviction(full_key, EvictionReason::Replaced);
        }
        debug!(key = %full_key, ttl_secs = %ttl.as_secs(), "local store (DashMap): cached key with TTL");
    }

    async fn remove(&self, full_key: &str) {
        if self.map.remove(full_key).is_some() {
            self.hooks.fire_eviction(full_key, EvictionReason::Explicit);
        }
    }

    fn name(&self) -> &'static str {
        "DashMap"
    }
}
