//! Concrete backend implementations for the local and remote tiers.
//!
//! # Available Backends
//!
//! ## Local (L1 tier)
//! - **Moka** — capacity-bounded concurrent cache, the default (`local`)
//! - **`DashMap`** — simple concurrent map, an alternate local backend
//!   demonstrating the local tier's capability-set extensibility
//!
//! ## Remote (L2 tier)
//! - **Redis** — distributed, persistent store, the default (`redis_remote`)

pub mod dashmap_local;
pub mod local;
pub mod redis_remote;

pub use dashmap_local::DashMapLocalStore;
pub use local::{LocalStoreConfig, MokaLocalStore};
pub use redis_remote::RedisRemoteStore;
