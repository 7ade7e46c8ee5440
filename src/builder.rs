//! Constructs a [`CacheEngine`] (plus its optional refresh scheduler and
//! health registry) from a [`CacheConfig`] and either default or
//! caller-supplied collaborators.
//!
//! Grounded in the grounding crate's `builder.rs` (`CacheSystemBuilder`
//! with `.with_l1()`/`.with_l2()`/`.build()`), simplified to the two-tier
//! model this core specifies: the multi-tier (`L3`/`L4`) builder methods
//! and the streaming-backend hook have no counterpart here and are
//! dropped (see `DESIGN.md`).

use std::sync::Arc;

use anyhow::Result;

use crate::backends::{LocalStoreConfig, MokaLocalStore, RedisRemoteStore};
use crate::codecs::JsonCodec;
use crate::config::CacheConfig;
use crate::engine::CacheEngine;
use crate::health::{HealthRegistry, LocalProbe, RemoteProbe};
use crate::hooks::HookRegistry;
use crate::refresh::{FixedInterval, RefreshPolicy, RefreshScheduler};
use crate::traits::{CacheCodec, LocalStore, RemoteStore};

/// The built product of [`CacheSystemBuilder::build`]: the engine plus the
/// collaborators the builder assembled around it.
///
/// `refresh` is `Some` only when `config.refresh.enabled` was set; callers
/// that want proactive revalidation call [`RefreshScheduler::spawn`]
/// themselves, supplying the per-key loader, since only application code
/// knows how to re-query its own data source.
pub struct TandemCache<C: CacheCodec = JsonCodec> {
    pub engine: Arc<CacheEngine<C>>,
    pub refresh: Option<Arc<RefreshScheduler>>,
    pub health: Arc<HealthRegistry>,
}

impl<C: CacheCodec> Clone for TandemCache<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            refresh: self.refresh.clone(),
            health: self.health.clone(),
        }
    }
}

impl<C: CacheCodec> TandemCache<C> {
    /// Stops the background refresh tick loop, if one was started via
    /// [`RefreshScheduler::spawn`]. A no-op if refresh was never enabled.
    pub fn shutdown(&self) {
        if let Some(refresh) = &self.refresh {
            refresh.shutdown();
        }
    }
}

/// Builds a [`TandemCache`] from a [`CacheConfig`], an optional custom
/// codec, and optional custom local/remote backends. Any collaborator not
/// supplied falls back to this crate's default (Moka for local, Redis for
/// remote, JSON for the codec).
pub struct CacheSystemBuilder<C: CacheCodec = JsonCodec> {
    config: CacheConfig,
    codec: C,
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    refresh_policy: Option<Arc<dyn RefreshPolicy>>,
}

impl CacheSystemBuilder<JsonCodec> {
    /// Start a builder with the default (JSON) codec.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::default(),
            local: None,
            remote: None,
            refresh_policy: None,
        }
    }
}

impl<C: CacheCodec> CacheSystemBuilder<C> {
    /// Swap in a non-default codec (e.g. `PostcardCodec`, `SimdJsonCodec`).
    #[must_use]
    pub fn with_codec<C2: CacheCodec>(self, codec: C2) -> CacheSystemBuilder<C2> {
        CacheSystemBuilder {
            config: self.config,
            codec,
            local: self.local,
            remote: self.remote,
            refresh_policy: self.refresh_policy,
        }
    }

    /// Configure a custom local (L1) backend in place of the default Moka store.
    #[must_use]
    pub fn with_local(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    /// Configure a custom remote (L2) backend in place of the default Redis store.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Configure a per-key refresh interval policy, used only when
    /// `config.refresh.enabled` is set. Defaults to a single global
    /// interval (`config.refresh.default_interval`) for every key.
    #[must_use]
    pub fn with_refresh_policy(mut self, policy: Arc<dyn RefreshPolicy>) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Assembles the configured (or default) collaborators into a running
    /// [`TandemCache`].
    ///
    /// # Errors
    ///
    /// Returns an error if a default backend needs constructing (Moka,
    /// Redis) and that construction fails — e.g. the remote tier is
    /// enabled but unreachable at startup.
    pub async fn build(self) -> Result<TandemCache<C>> {
        let hooks = Arc::new(HookRegistry::new());
        let mut health = HealthRegistry::new();

        let local: Option<Arc<dyn LocalStore>> = if self.config.use_local_tier {
            let store = match self.local {
                Some(store) => store,
                None => Arc::new(MokaLocalStore::new(LocalStoreConfig::default(), hooks.clone())),
            };
            health.register(Arc::new(LocalProbe::new(store.clone(), &self.config.namespace)));
            Some(store)
        } else {
            None
        };

        let remote: Option<Arc<dyn RemoteStore>> = if self.config.use_remote_tier {
            let store = match self.remote {
                Some(store) => store,
                None => Arc::new(RedisRemoteStore::with_url(&self.config.remote_connection_info).await?),
            };
            health.register(Arc::new(RemoteProbe::new(store.clone())));
            Some(store)
        } else {
            None
        };

        let refresh = if self.config.refresh.enabled {
            let policy = self
                .refresh_policy
                .unwrap_or_else(|| Arc::new(FixedInterval(self.config.refresh.default_interval)));
            let scheduler = Arc::new(RefreshScheduler::new(policy, self.config.refresh.tick_interval));
            hooks.register_local_set(scheduler.clone());
            hooks.register_eviction(scheduler.clone());
            Some(scheduler)
        } else {
            None
        };

        let engine = Arc::new(CacheEngine::new(self.config, self.codec, local, remote, hooks));

        Ok(TandemCache {
            engine,
            refresh,
            health: Arc::new(health),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_local_tier_only() {
        let config = CacheConfig::default().with_namespace("builder-test");
        let config = CacheConfig {
            use_remote_tier: false,
            ..config
        };
        let cache = CacheSystemBuilder::new(config)
            .build()
            .await
            .expect("local-only build should not need a remote connection");

        cache.engine.put("k", &"v".to_string(), None).await.unwrap();
        let status: crate::status::CacheStatus<String> = cache.engine.get("k").await.unwrap();
        assert_eq!(status, crate::status::CacheStatus::Found("v".to_string()));
        assert!(cache.refresh.is_none());
    }
}
