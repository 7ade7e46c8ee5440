//! Tandem Cache
//!
//! A two-tier caching core: an in-process tier (L1, sub-microsecond
//! lookups on recently used values) in front of a shared remote tier (L2,
//! cross-process consistency and persistence), coordinating reads,
//! writes, invalidations, concurrent loaders, negative-result ("known
//! absent") caching, and a background freshness loop.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tandem_cache::{CacheConfig, CacheStatus, CacheSystemBuilder};
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! struct Product {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheSystemBuilder::new(CacheConfig::default().with_namespace("products"))
//!         .build()
//!         .await?;
//!
//!     let status = cache
//!         .engine
//!         .get_or_load("42", None, |key| async move {
//!             // Stand-in for a database round trip.
//!             Ok(Some(Product { id: key.parse().unwrap_or(0), name: "Widget".into() }))
//!         })
//!         .await?;
//!
//!     match status {
//!         CacheStatus::Found(product) => println!("loaded {}", product.name),
//!         CacheStatus::KnownAbsent => println!("known absent"),
//!         CacheStatus::NotFound => unreachable!("get_or_load never returns NotFound"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller -> engine -> L1 facade (fast path)
//!                  -> L2 facade (miss fallback)
//!                  -> data source (on miss, single-flight guarded)
//! ```
//!
//! See `DESIGN.md` for the grounding ledger and `SPEC_FULL.md` for the
//! full behavioral specification this crate implements.

pub mod backends;
pub mod builder;
pub mod codecs;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod hooks;
pub mod invalidation;
pub mod lock_table;
pub mod refresh;
pub mod remote_lock;
pub mod status;
pub mod traits;

pub use backends::{DashMapLocalStore, LocalStoreConfig, MokaLocalStore, RedisRemoteStore};
pub use builder::{CacheSystemBuilder, TandemCache};
pub use codecs::{is_tombstone, JsonCodec, TOMBSTONE_SENTINEL};
#[cfg(feature = "postcard")]
pub use codecs::PostcardCodec;
#[cfg(feature = "simd_json")]
pub use codecs::SimdJsonCodec;
pub use config::{CacheConfig, LockConfig, NegativeCachingConfig, RefreshConfig, TelemetryConfig};
pub use engine::{CacheEngine, EngineStats};
pub use error::{CacheError, CacheResult};
pub use health::{HealthProbe, HealthRegistry, HealthReport, HealthStatus, LocalProbe, RemoteProbe};
pub use hooks::{EvictionHook, EvictionReason, HookRegistry, LocalSetHook, RemoteSetHook};
pub use invalidation::{
    AutoBroadcastHook, InvalidationConfig, InvalidationMessage, InvalidationPublisher,
    InvalidationSubscriber,
};
pub use lock_table::{LockGuard, LockTable};
pub use refresh::{FixedInterval, RefreshPolicy, RefreshScheduler};
pub use remote_lock::{RemoteLock, RemoteLockGuard};
pub use status::{CacheStatus, Slot};
pub use traits::{CacheCodec, LocalStore, RemoteStore};

// Re-export async_trait for callers implementing `LocalStore`/`RemoteStore`.
pub use async_trait::async_trait;
