//! Configuration surface for the cache core.
//!
//! Mirrors the grounding crate's `CacheStrategy`/`MokaCacheConfig` pattern of
//! a plain struct with a sensible `Default`, constructible directly or via
//! environment variables.

use std::time::Duration;

/// Top-level configuration recognized by [`crate::engine::CacheEngine`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace all keys in this engine instance are bound to.
    pub namespace: String,
    /// Whether the in-process (L1) tier is consulted/written at all.
    pub use_local_tier: bool,
    /// Whether the remote (L2) tier is consulted/written at all.
    pub use_remote_tier: bool,
    /// Connection string for the remote tier (opaque to the engine).
    pub remote_connection_info: String,
    /// Logical database index on the remote tier, if it supports one.
    pub remote_database_index: i64,
    /// Negative-caching ("tombstone") behavior.
    pub negative_caching: NegativeCachingConfig,
    /// Locking behavior for stampede suppression.
    pub locks: LockConfig,
    /// Background refresh behavior.
    pub refresh: RefreshConfig,
    /// Default TTL applied when a caller does not specify one.
    pub default_ttl: Duration,
    /// Telemetry sampling/recording knobs.
    pub telemetry: TelemetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            use_local_tier: true,
            use_remote_tier: true,
            remote_connection_info: "redis://127.0.0.1:6379".to_string(),
            remote_database_index: 0,
            negative_caching: NegativeCachingConfig::default(),
            locks: LockConfig::default(),
            refresh: RefreshConfig::default(),
            default_ttl: Duration::from_secs(300),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Start from defaults and override the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Start from defaults and override the remote connection string.
    #[must_use]
    pub fn with_remote_connection_info(mut self, info: impl Into<String>) -> Self {
        self.remote_connection_info = info.into();
        self
    }

    /// Read a `CacheConfig` from the process environment, the way the
    /// grounding crate reads `REDIS_URL`. Unset variables fall back to
    /// [`CacheConfig::default`] values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CACHE_REMOTE_URL").or_else(|_| std::env::var("REDIS_URL"))
        {
            config.remote_connection_info = url;
        }
        if let Ok(ns) = std::env::var("CACHE_NAMESPACE") {
            config.namespace = ns;
        }
        config
    }

    /// Derive the full L2/remote key for a user key under this config's namespace.
    #[must_use]
    pub fn full_key(&self, user_key: &str) -> String {
        format!("{}:{}", self.namespace, user_key)
    }

    /// Derive the remote-lock key for a user key under this config's namespace.
    #[must_use]
    pub fn lock_key(&self, user_key: &str) -> String {
        format!("lock:{}:{}", self.namespace, user_key)
    }
}

/// Negative-caching ("tombstone") configuration.
#[derive(Debug, Clone, Copy)]
pub struct NegativeCachingConfig {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for NegativeCachingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(30),
        }
    }
}

/// Locking configuration for stampede suppression.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    pub in_process_enabled: bool,
    pub remote_enabled: bool,
    pub wait_budget: Duration,
    pub remote_guard: Duration,
    /// Delay between remote-lock acquisition polls (spec: fixed ~50ms).
    pub remote_poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            in_process_enabled: true,
            remote_enabled: true,
            wait_budget: Duration::from_millis(500),
            remote_guard: Duration::from_secs(5),
            remote_poll_interval: Duration::from_millis(50),
        }
    }
}

/// Background refresh configuration.
#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    pub enabled: bool,
    pub default_interval: Duration,
    /// Scheduler tick period (spec: ~100ms).
    pub tick_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_interval: Duration::from_secs(60),
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Telemetry recording knobs. The core only records through these hooks;
/// exporting is out of scope (see `SPEC_FULL.md`).
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub record_keys: bool,
    pub record_value_size: bool,
    pub sampling_ratio: f64,
    pub custom_tags: Vec<(String, String)>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            record_keys: true,
            record_value_size: false,
            sampling_ratio: 1.0,
            custom_tags: Vec::new(),
        }
    }
}
