//! Observability/extension hooks fired by the cache engine's hot path.
//!
//! Grounded in the engine's need (spec-level: §4.6.9) for extension points
//! that don't require the engine to know its subscribers at construction
//! time — registered the way the grounding crate wires its invalidation
//! subscriber callback into `CacheManager` after construction.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Reason an entry was removed from the local (L1) tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Expired,
    Capacity,
    Replaced,
    Explicit,
    Other,
}

/// Fired when an entry is dropped from the local tier, on every removal path.
pub trait EvictionHook: Send + Sync {
    fn on_eviction(&self, key: &str, reason: EvictionReason);
}

/// Fired when the engine writes a new value into the local tier.
pub trait LocalSetHook: Send + Sync {
    fn on_local_set(&self, key: &str);
}

/// Fired when the engine writes a new value into the remote tier.
pub trait RemoteSetHook: Send + Sync {
    fn on_remote_set(&self, key: &str, ttl: Duration);
}

/// Registry of subscribers for the engine's hot-path hooks.
///
/// Backends hold an `Arc<HookRegistry>` so they can fire eviction events
/// without knowing about the engine that eventually subscribes to them.
#[derive(Default)]
pub struct HookRegistry {
    eviction: RwLock<Vec<Arc<dyn EvictionHook>>>,
    local_set: RwLock<Vec<Arc<dyn LocalSetHook>>>,
    remote_set: RwLock<Vec<Arc<dyn RemoteSetHook>>>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_eviction(&self, hook: Arc<dyn EvictionHook>) {
        self.eviction.write().push(hook);
    }

    pub fn register_local_set(&self, hook: Arc<dyn LocalSetHook>) {
        self.local_set.write().push(hook);
    }

    pub fn register_remote_set(&self, hook: Arc<dyn RemoteSetHook>) {
        self.remote_set.write().push(hook);
    }

    pub fn fire_eviction(&self, key: &str, reason: EvictionReason) {
        for hook in self.eviction.read().iter() {
            hook.on_eviction(key, reason);
        }
    }

    pub fn fire_local_set(&self, key: &str) {
        for hook in self.local_set.read().iter() {
            hook.on_local_set(key);
        }
    }

    pub fn fire_remote_set(&self, key: &str, ttl: Duration) {
        for hook in self.remote_set.read().iter() {
            hook.on_remote_set(key, ttl);
        }
    }
}
