//! Keyed Lock Table: per-key cooperative in-process mutual exclusion.
//!
//! Grounded in the grounding crate's `InFlightMap`/`CleanupGuard` pattern in
//! its cache manager (a `DashMap<String, Arc<Mutex<()>>>` of per-key
//! slots), generalized into a standalone component. Unlike that pattern,
//! slots here are never removed from the map after use: the design
//! deliberately retains lock slots for the process lifetime (a documented
//! simplification, not an oversight — see `DESIGN.md`).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::CacheError;

/// Holds a per-key slot for as long as the guard is alive. Releasing is
/// just dropping the guard; idempotent by construction (there is nothing
/// to double-release).
pub struct LockGuard {
    _inner: OwnedMutexGuard<()>,
}

/// Cooperative mutual exclusion keyed by user key.
///
/// Not reentrant: acquiring the same key twice from the same logical
/// caller will deadlock, by design (see `DESIGN.md`'s note on the engine's
/// locked/unlocked `put` split).
pub struct LockTable {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn slot_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Block up to `wait_budget` to obtain the slot for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::LockAcquisitionTimeout`] if `wait_budget`
    /// elapses first. This is a normal condition, not a fatal one: callers
    /// downgrade to a lock-free path.
    pub async fn acquire(&self, key: &str, wait_budget: Duration) -> Result<LockGuard, CacheError> {
        let slot = self.slot_for(key);
        match tokio::time::timeout(wait_budget, slot.lock_owned()).await {
            Ok(guard) => Ok(LockGuard { _inner: guard }),
            Err(_) => Err(CacheError::LockAcquisitionTimeout {
                key: key.to_string(),
                waited: wait_budget,
            }),
        }
    }

    /// Number of keys that have ever contended for a slot. Exposed for
    /// tests and diagnostics; not part of the locking contract.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.slots.len()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
