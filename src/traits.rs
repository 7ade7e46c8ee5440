//! Collaborator traits the cache engine depends on but does not implement
//! concretely: the codec, the local (L1) store, and the remote (L2) store.
//!
//! # Example: Custom Local Backend
//!
//! ```rust,ignore
//! use tandem_cache::{LocalStore, async_trait, Slot};
//! use std::time::Duration;
//!
//! struct MyLocalStore;
//!
//! #[async_trait]
//! impl LocalStore for MyLocalStore {
//!     async fn try_get(&self, full_key: &str) -> Option<Slot> {
//!         // Your implementation
//!         None
//!     }
//!
//!     async fn set(&self, full_key: &str, value: Slot, ttl: Duration) {
//!         // Your implementation
//!     }
//!
//!     async fn remove(&self, full_key: &str) {
//!         // Your implementation
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheResult;
use crate::status::Slot;

/// Pluggable serialization for domain values.
///
/// Implementations must be `Send + Sync + Debug` to support concurrent
/// access across async tasks and to support debugging.
pub trait CacheCodec: Send + Sync + std::fmt::Debug {
    /// Serialize a value to its wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<Vec<u8>>;

    /// Deserialize a value from its wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded as `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> anyhow::Result<T>;

    /// Name of this codec, for logging and debugging.
    fn name(&self) -> &'static str;
}

/// Typed view over the bounded in-process (L1) store.
///
/// Implementations own their TTL and eviction policy; the engine supplies
/// the TTL on every write and never extends it implicitly. Every removal
/// path (explicit, expiry, capacity, replacement) must be observable to
/// subscribers through the backend's [`crate::hooks::HookRegistry`].
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Look up a key. `Some(Slot::Tombstone)` distinguishes "known absent"
    /// from `None` ("not cached at all").
    async fn try_get(&self, full_key: &str) -> Option<Slot>;

    /// Store a value (or tombstone) with an absolute time-to-live.
    async fn set(&self, full_key: &str, value: Slot, ttl: Duration);

    /// Remove a key, if present.
    async fn remove(&self, full_key: &str);

    /// Name of this backend, for logging and debugging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Typed view over the remote (L2) key-value store.
///
/// Operates purely on wire bytes — tombstone-vs-domain-value translation
/// happens one layer up, in the engine, using the codec's reserved
/// sentinel. This keeps the trait a faithful byte-oriented analogue of a
/// real remote store's command surface (Redis GET/SET/DEL/SCAN/EVAL).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the raw wire bytes for a key, if present.
    async fn get(&self, full_key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write raw wire bytes with a time-to-live.
    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Write raw wire bytes only if the key is currently absent. Returns
    /// whether the write took effect.
    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration)
        -> CacheResult<bool>;

    /// Delete a key. Returns whether a key was actually removed.
    async fn delete(&self, full_key: &str) -> CacheResult<bool>;

    /// Fetch multiple keys in one round trip. Result order matches input order.
    async fn multi_get(&self, full_keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>>;

    /// Delete multiple keys in one round trip. Returns the number removed.
    async fn multi_delete(&self, full_keys: &[String]) -> CacheResult<usize>;

    /// Round-trip latency to the remote store.
    async fn ping(&self) -> CacheResult<Duration>;

    /// Atomically set `lock_key -> token` only if absent, with a guard TTL.
    /// Returns whether the lock was acquired.
    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration)
        -> CacheResult<bool>;

    /// Atomically delete `lock_key` only if its current value equals
    /// `token`. Returns whether the release actually happened.
    async fn release_lock(&self, lock_key: &str, token: &str) -> CacheResult<bool>;

    /// Name of this backend, for logging and debugging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}
