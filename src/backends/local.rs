//! Moka-backed L1 Facade — the default local (in-process) store.
//!
//! Grounded in the grounding crate's `backends/moka_cache.rs` (capacity
//! config, hit/miss/set counters), rewritten to the `Vec<u8>`/[`Slot`]
//! signature [`crate::traits::LocalStore`] actually declares, and to carry
//! a per-entry absolute TTL the way the grounding crate's `CacheEntry`
//! does manually (moka's own `time_to_live`/`time_to_idle` are
//! cache-global, not per-entry).
//!
//! Eviction reporting splits two ways: `Capacity` and `Replaced` are only
//! detectable by moka itself (automatic, background eviction), so they are
//! reported through moka's `eviction_listener`. `Explicit` and `Expired`
//! are always triggered by our own code (an explicit `remove()` call, or
//! lazily on a `try_get` that finds a stale entry), so they are reported
//! at the call site instead — the listener ignores them to avoid firing
//! twice for the same removal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::{debug, info};

use crate::hooks::{EvictionReason, HookRegistry};
use crate::status::Slot;
use crate::traits::LocalStore;

/// Configuration for [`MokaLocalStore`].
#[derive(Debug, Clone, Copy)]
pub struct LocalStoreConfig {
    /// Maximum number of entries before moka begins capacity-based eviction.
    pub max_capacity: u64,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self { max_capacity: 10_000 }
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Slot,
    expires_at: Instant,
}

/// The default L1 (in-process) backend: a Moka cache of [`Slot`]s with
/// application-managed per-entry TTL.
pub struct MokaLocalStore {
    cache: Cache<String, StoredEntry>,
    hooks: Arc<HookRegistry>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl MokaLocalStore {
    #[must_use]
    pub fn new(config: LocalStoreConfig, hooks: Arc<HookRegistry>) -> Self {
        info!(capacity = config.max_capacity, "initializing local (Moka) store");

        let listener_hooks = hooks.clone();
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .eviction_listener(move |key, _value, cause| {
                let reason = match cause {
                    RemovalCause::Replaced => Some(EvictionReason::Replaced),
                    RemovalCause::Size => Some(EvictionReason::Capacity),
                    // Explicit/Expired are always reported by our own code
                    // (see module docs); ignore moka's own notion of them
                    // here to avoid a double fire.
                    RemovalCause::Explicit | RemovalCause::Expired => None,
                };
                if let Some(reason) = reason {
                    listener_hooks.fire_eviction(&key, reason);
                }
            })
            .build();

        Self {
            cache,
            hooks,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LocalStore for MokaLocalStore {
    async fn try_get(&self, full_key: &str) -> Option<Slot> {
        match self.cache.get(full_key).await {
            Some(entry) if Instant::now() < entry.expires_at => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            Some(_) => {
                self.cache.invalidate(full_key).await;
                self.hooks.fire_eviction(full_key, EvictionReason::Expired);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, full_key: &str, value: Slot, ttl: Duration) {
        let entry = StoredEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.cache.insert(full_key.to_string(), entry).await;
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %full_key, ttl_secs = %ttl.as_secs(), "local store: cached key with TTL");
    }

    async fn remove(&self, full_key: &str) {
        if self.cache.contains_key(full_key) {
            self.cache.invalidate(full_key).await;
            self.hooks.fire_eviction(full_key, EvictionReason::Explicit);
        }
    }

    fn name(&self) -> &'static str {
        "Moka"
    }
}
