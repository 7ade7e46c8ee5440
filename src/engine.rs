//! Cache Engine: orchestrates the read, write, load-through, invalidate,
//! and batch paths across the lock table, the local/remote facades, and
//! the caller's data source.
//!
//! Grounded in the grounding crate's `CacheManager` (`get_or_compute`'s
//! loader-closure idiom, L1-then-L2 read fallthrough, stats counters),
//! rebuilt around [`Slot`]/[`CacheStatus`] and the locked/unlocked `put`
//! split the stampede-suppression protocol requires. Suspension points
//! that can loop or block (lock acquisition) race against a
//! [`CancellationToken`]; operations with a single, bounded remote call
//! only check it up front, since there is nothing further to interrupt.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codecs::{is_tombstone, TOMBSTONE_SENTINEL};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::hooks::HookRegistry;
use crate::lock_table::{LockGuard, LockTable};
use crate::remote_lock::{RemoteLock, RemoteLockGuard};
use crate::status::{CacheStatus, Slot};
use crate::traits::{CacheCodec, LocalStore, RemoteStore};

/// Point-in-time counters for an engine instance. Cheap to read; not
/// persisted across restarts.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub local_hits: AtomicU64,
    pub local_misses: AtomicU64,
    pub remote_hits: AtomicU64,
    pub remote_misses: AtomicU64,
    pub loads: AtomicU64,
    pub load_failures: AtomicU64,
}

impl EngineStats {
    fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }
    fn record_local_miss(&self) {
        self.local_misses.fetch_add(1, Ordering::Relaxed);
    }
    fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }
    fn record_remote_miss(&self) {
        self.remote_misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Coordinates L1, L2, and the authoritative data source behind one
/// namespace. Generic over the wire codec so callers can opt into
/// `postcard`/`simd_json` without a trait object in the hot path.
pub struct CacheEngine<C: CacheCodec> {
    config: CacheConfig,
    codec: C,
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    lock_table: LockTable,
    remote_lock: Option<RemoteLock>,
    hooks: Arc<HookRegistry>,
    stats: EngineStats,
}

impl<C: CacheCodec> CacheEngine<C> {
    #[must_use]
    pub fn new(
        config: CacheConfig,
        codec: C,
        local: Option<Arc<dyn LocalStore>>,
        remote: Option<Arc<dyn RemoteStore>>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let remote_lock = if config.locks.remote_enabled {
            remote
                .clone()
                .map(|r| RemoteLock::new(r, config.locks.remote_poll_interval))
        } else {
            None
        };

        Self {
            config,
            codec,
            local,
            remote,
            lock_table: LockTable::new(),
            remote_lock,
            hooks,
            stats: EngineStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn full_key(&self, key: &str) -> String {
        self.config.full_key(key)
    }

    fn lock_key(&self, key: &str) -> String {
        self.config.lock_key(key)
    }

    fn encode<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<Vec<u8>> {
        self.codec
            .serialize(value)
            .map_err(|source| CacheError::SerializationFailure {
                key: key.to_string(),
                source,
            })
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, wire: &[u8]) -> CacheResult<T> {
        self.codec
            .deserialize(wire)
            .map_err(|source| CacheError::SerializationFailure {
                key: key.to_string(),
                source,
            })
    }

    // ---- locking helpers -------------------------------------------------

    async fn acquire_local_lock(
        &self,
        full_key: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<LockGuard>> {
        if !self.config.locks.in_process_enabled {
            return Ok(None);
        }
        tokio::select! {
            res = self.lock_table.acquire(full_key, self.config.locks.wait_budget) => {
                match res {
                    Ok(guard) => Ok(Some(guard)),
                    Err(CacheError::LockAcquisitionTimeout { .. }) => {
                        warn!(key = %full_key, "in-process lock not acquired within wait budget, proceeding lock-free");
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            }
            () = cancel.cancelled() => Err(CacheError::Cancelled),
        }
    }

    async fn acquire_remote_lock(
        &self,
        lock_key: &str,
        cancel: &CancellationToken,
    ) -> Option<RemoteLockGuard> {
        let remote_lock = self.remote_lock.as_ref()?;
        tokio::select! {
            guard = remote_lock.acquire(lock_key, self.config.locks.wait_budget, self.config.locks.remote_guard) => guard,
            () = cancel.cancelled() => None,
        }
    }

    /// Writes L2 first, then L1 (§4.6.3: prevents a reader that missed L1
    /// from observing a stale L2 value while a newer one sits in L1).
    /// Failures are absorbed: logged, not returned, so cache unavailability
    /// cannot fail a caller whose load already succeeded.
    async fn write_slot_unlocked(&self, full_key: &str, slot: Slot, ttl: Duration) {
        if let Some(remote) = &self.remote {
            let wire: &[u8] = match &slot {
                Slot::Value(bytes) => bytes,
                Slot::Tombstone => TOMBSTONE_SENTINEL,
            };
            match remote.set(full_key, wire, ttl).await {
                Ok(()) => self.hooks.fire_remote_set(full_key, ttl),
                Err(err) => warn!(key = %full_key, error = %err, "remote write suppressed, continuing local-only for this key"),
            }
        }
        if let Some(local) = &self.local {
            local.set(full_key, slot, ttl).await;
            self.hooks.fire_local_set(full_key);
        }
    }

    async fn put_locked(
        &self,
        full_key: &str,
        lock_key: &str,
        slot: Slot,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> CacheResult<()> {
        let local_guard = self.acquire_local_lock(full_key, cancel).await?;
        let remote_guard = self.acquire_remote_lock(lock_key, cancel).await;

        self.write_slot_unlocked(full_key, slot, ttl).await;

        if let Some(guard) = remote_guard {
            guard.release().await;
        }
        drop(local_guard);
        Ok(())
    }

    // ---- reads -------------------------------------------------------

    /// Read-only lookup. Never invokes the data source and never takes a lock.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SerializationFailure`] if a value was found but
    /// could not be decoded.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<CacheStatus<T>> {
        let full_key = self.full_key(key);

        if let Some(local) = &self.local {
            match local.try_get(&full_key).await {
                Some(Slot::Value(wire)) => {
                    self.stats.record_local_hit();
                    return Ok(CacheStatus::Found(self.decode(key, &wire)?));
                }
                Some(Slot::Tombstone) => {
                    self.stats.record_local_hit();
                    return Ok(CacheStatus::KnownAbsent);
                }
                None => self.stats.record_local_miss(),
            }
        }

        let Some(remote) = &self.remote else {
            return Ok(CacheStatus::NotFound);
        };

        match remote.get(&full_key).await {
            Ok(Some(wire)) => {
                self.stats.record_remote_hit();
                if is_tombstone(&wire) {
                    if let Some(local) = &self.local {
                        let ttl = self.config.default_ttl.min(self.config.negative_caching.ttl);
                        local.set(&full_key, Slot::Tombstone, ttl).await;
                        self.hooks.fire_local_set(&full_key);
                    }
                    Ok(CacheStatus::KnownAbsent)
                } else {
                    let value: T = self.decode(key, &wire)?;
                    if let Some(local) = &self.local {
                        local.set(&full_key, Slot::Value(wire), self.config.default_ttl).await;
                        self.hooks.fire_local_set(&full_key);
                    }
                    Ok(CacheStatus::Found(value))
                }
            }
            Ok(None) => {
                self.stats.record_remote_miss();
                debug!(key = %key, "cache miss recorded in both tiers");
                Ok(CacheStatus::NotFound)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "remote read failed, reporting as miss");
                Ok(CacheStatus::NotFound)
            }
        }
    }

    /// Load-through read with single-flight stampede suppression, using a
    /// caller-controlled [`CancellationToken`].
    ///
    /// # Errors
    ///
    /// Propagates the loader's own error as [`CacheError::DataSourceFailure`],
    /// and [`CacheError::Cancelled`] if `cancel` fires before the load
    /// begins. Cache-layer failures during backfill are absorbed.
    pub async fn get_or_load_cancellable<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
        loader: F,
    ) -> CacheResult<CacheStatus<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let status = self.get(key).await?;
        if !status.is_not_found() {
            return Ok(status);
        }

        let full_key = self.full_key(key);
        let lock_key = self.lock_key(key);

        let local_guard = self.acquire_local_lock(&full_key, cancel).await?;

        let status = self.get(key).await?;
        if !status.is_not_found() {
            drop(local_guard);
            return Ok(status);
        }

        let remote_guard = self.acquire_remote_lock(&lock_key, cancel).await;

        if remote_guard.is_some() {
            let status = self.get(key).await?;
            if !status.is_not_found() {
                if let Some(guard) = remote_guard {
                    guard.release().await;
                }
                drop(local_guard);
                return Ok(status);
            }
        }

        if cancel.is_cancelled() {
            if let Some(guard) = remote_guard {
                guard.release().await;
            }
            drop(local_guard);
            return Err(CacheError::Cancelled);
        }

        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        let loaded = loader(key.to_string()).await;

        let result = match loaded {
            Ok(Some(value)) => {
                match self.encode(key, &value) {
                    Ok(wire) => {
                        let ttl = ttl.unwrap_or(self.config.default_ttl);
                        self.write_slot_unlocked(&full_key, Slot::Value(wire), ttl).await;
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "serialization failed, caching suppressed for this load");
                    }
                }
                Ok(CacheStatus::Found(value))
            }
            Ok(None) => {
                if self.config.negative_caching.enabled {
                    self.write_slot_unlocked(&full_key, Slot::Tombstone, self.config.negative_caching.ttl)
                        .await;
                }
                Ok(CacheStatus::KnownAbsent)
            }
            Err(err) => {
                self.stats.load_failures.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::DataSourceFailure(err))
            }
        };

        if let Some(guard) = remote_guard {
            guard.release().await;
        }
        drop(local_guard);
        result
    }

    /// [`Self::get_or_load_cancellable`] without an external cancellation
    /// signal.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_load_cancellable`].
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> CacheResult<CacheStatus<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        self.get_or_load_cancellable(key, ttl, &CancellationToken::new(), loader)
            .await
    }

    // ---- writes --------------------------------------------------------

    /// Authoritative write. Cache-layer failures (serialization, remote
    /// transport) are absorbed and logged rather than returned, so that
    /// cache unavailability cannot fail a caller's write.
    ///
    /// # Errors
    ///
    /// Only returns [`CacheError::Cancelled`].
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.put_cancellable(key, value, ttl, &CancellationToken::new()).await
    }

    /// [`Self::put`] with an external cancellation signal.
    ///
    /// # Errors
    ///
    /// Only returns [`CacheError::Cancelled`].
    pub async fn put_cancellable<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> CacheResult<()> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let full_key = self.full_key(key);
        let lock_key = self.lock_key(key);
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        match self.encode(key, value) {
            Ok(wire) => {
                self.put_locked(&full_key, &lock_key, Slot::Value(wire), ttl, cancel)
                    .await
            }
            Err(err) => {
                warn!(key = %key, error = %err, "serialization failed, write suppressed");
                Ok(())
            }
        }
    }

    /// Writes a tombstone directly, bypassing the data source. Used by the
    /// refresh path and available to callers who want to seed negative
    /// caching explicitly.
    ///
    /// # Errors
    ///
    /// Only returns [`CacheError::Cancelled`].
    pub async fn put_tombstone(&self, key: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let full_key = self.full_key(key);
        let lock_key = self.lock_key(key);
        let ttl = ttl.unwrap_or(self.config.negative_caching.ttl);
        self.put_locked(&full_key, &lock_key, Slot::Tombstone, ttl, &CancellationToken::new())
            .await
    }

    /// Conditional write: succeeds only if the remote tier did not already
    /// hold a value for `key`. L1 is left untouched; the next `get`
    /// populates it from L2 to avoid ambiguity on partial failure.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::RemoteUnavailable`] if the remote tier is
    /// disabled or the transport call fails — unlike [`Self::put`], a
    /// caller relying on the conditional guarantee needs to know whether
    /// it actually held, so this does not silently degrade to `false`.
    pub async fn put_if_absent<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let Some(remote) = &self.remote else {
            return Err(CacheError::RemoteUnavailable("remote tier disabled".to_string()));
        };
        let full_key = self.full_key(key);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let wire = self.encode(key, value)?;
        let took_effect = remote.set_if_absent(&full_key, &wire, ttl).await?;
        if took_effect {
            self.hooks.fire_remote_set(&full_key, ttl);
        }
        Ok(took_effect)
    }

    /// Removes from L1, then L2. Not lock-guarded: best-effort-soonest.
    /// Returns whether L2 reported a deletion.
    ///
    /// # Errors
    ///
    /// Never returns an error; remote transport failures are absorbed and
    /// reported as `false`.
    pub async fn invalidate(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);
        if let Some(local) = &self.local {
            local.remove(&full_key).await;
        }
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        match remote.delete(&full_key).await {
            Ok(deleted) => Ok(deleted),
            Err(err) => {
                warn!(key = %key, error = %err, "remote invalidate failed");
                Ok(false)
            }
        }
    }

    /// Write-through to the data source, then invalidate both tiers.
    /// Chosen over write-through-to-cache to avoid the stale-cache race
    /// where the source commit outlives the cache write.
    ///
    /// # Errors
    ///
    /// Propagates the updater's own error as [`CacheError::DataSourceFailure`]
    /// without touching either tier.
    pub async fn update<T, F, Fut>(&self, key: &str, value: T, updater: F) -> CacheResult<()>
    where
        F: FnOnce(String, T) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        updater(key.to_string(), value)
            .await
            .map_err(CacheError::DataSourceFailure)?;
        self.invalidate(key).await?;
        Ok(())
    }

    /// Forced revalidation: bypasses both tiers' reads, queries the data
    /// source, and writes through.
    ///
    /// # Errors
    ///
    /// Propagates the loader's own error as [`CacheError::DataSourceFailure`].
    pub async fn reload<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> CacheResult<CacheStatus<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        match loader(key.to_string()).await.map_err(CacheError::DataSourceFailure)? {
            Some(value) => {
                self.put(key, &value, ttl).await?;
                Ok(CacheStatus::Found(value))
            }
            None => {
                if self.config.negative_caching.enabled {
                    self.put_tombstone(key, None).await?;
                    Ok(CacheStatus::KnownAbsent)
                } else {
                    self.invalidate(key).await?;
                    Ok(CacheStatus::NotFound)
                }
            }
        }
    }

    // ---- refresh (driven by the scheduler tick) -------------------------

    /// Runs the refresh algorithm for a single key. Called by
    /// [`crate::refresh::RefreshScheduler`]'s tick loop with the *full*
    /// (namespace-prefixed) key it tracks internally — hooks fire with the
    /// full key throughout (eviction listeners only ever see the key the
    /// backend was given), so the scheduler's bookkeeping is full-key
    /// keyed and this entry point takes one, stripping the namespace back
    /// off before touching `put`/`invalidate`/the loader, all of which
    /// operate on user keys. Every error path is isolated to this key and
    /// never propagates to the scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error only when the refresh itself could not be
    /// completed; the entry is always left untouched on failure so a
    /// failed refresh never increases cache inconsistency.
    pub async fn refresh<T, F, Fut>(&self, full_key: &str, loader: F) -> anyhow::Result<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        let key = full_key
            .strip_prefix(&format!("{}:", self.config.namespace))
            .unwrap_or(full_key);

        let Some(local) = &self.local else {
            return Ok(());
        };
        if local.try_get(full_key).await.is_none() {
            return Ok(());
        }

        let fresh_from_remote = match &self.remote {
            Some(remote) => match remote.get(full_key).await {
                Ok(Some(wire)) if !is_tombstone(&wire) => Some(wire),
                _ => None,
            },
            None => None,
        };

        if let Some(wire) = fresh_from_remote {
            let value: T = self.decode(key, &wire)?;
            local.set(full_key, Slot::Value(wire), self.config.default_ttl).await;
            self.hooks.fire_local_set(full_key);
            let _ = value;
            return Ok(());
        }

        match loader(key.to_string()).await? {
            Some(value) => {
                self.put(key, &value, None).await?;
            }
            None if self.config.negative_caching.enabled => {
                self.put_tombstone(key, None).await?;
            }
            None => {
                self.invalidate(key).await?;
            }
        }
        Ok(())
    }

    // ---- batch -----------------------------------------------------------

    /// Partitions `keys` into L1 hits and misses, issues one `multiGet` for
    /// the misses, decodes, backfills L1, and returns a map of only the
    /// keys that were found (domain value or tombstone).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SerializationFailure`] if any hit value fails
    /// to decode.
    pub async fn batch_get<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> CacheResult<HashMap<String, CacheStatus<T>>> {
        let mut results = HashMap::with_capacity(keys.len());
        let mut remaining: Vec<String> = Vec::new();

        if let Some(local) = &self.local {
            for key in keys {
                let full_key = self.full_key(key);
                match local.try_get(&full_key).await {
                    Some(Slot::Value(wire)) => {
                        results.insert(key.clone(), CacheStatus::Found(self.decode(key, &wire)?));
                    }
                    Some(Slot::Tombstone) => {
                        results.insert(key.clone(), CacheStatus::KnownAbsent);
                    }
                    None => remaining.push(key.clone()),
                }
            }
        } else {
            remaining = keys.to_vec();
        }

        if remaining.is_empty() {
            return Ok(results);
        }

        let Some(remote) = &self.remote else {
            return Ok(results);
        };

        let full_keys: Vec<String> = remaining.iter().map(|k| self.full_key(k)).collect();
        let wires = match remote.multi_get(&full_keys).await {
            Ok(wires) => wires,
            Err(err) => {
                warn!(error = %err, "remote multi_get failed, remaining keys reported as miss");
                return Ok(results);
            }
        };

        for (key, wire) in remaining.iter().zip(wires) {
            let Some(wire) = wire else { continue };
            let full_key = self.full_key(key);
            if is_tombstone(&wire) {
                if let Some(local) = &self.local {
                    let ttl = self.config.default_ttl.min(self.config.negative_caching.ttl);
                    local.set(&full_key, Slot::Tombstone, ttl).await;
                    self.hooks.fire_local_set(&full_key);
                }
                results.insert(key.clone(), CacheStatus::KnownAbsent);
            } else {
                let value: T = self.decode(key, &wire)?;
                if let Some(local) = &self.local {
                    local.set(&full_key, Slot::Value(wire), self.config.default_ttl).await;
                    self.hooks.fire_local_set(&full_key);
                }
                results.insert(key.clone(), CacheStatus::Found(value));
            }
        }

        Ok(results)
    }

    /// `batchGet`, then a caller-supplied bulk loader for the remaining
    /// misses, backfilling each through the same locked path `put` uses
    /// (minus the optimistic skip, since a batch has already paid for one
    /// round of reads).
    ///
    /// # Errors
    ///
    /// Propagates the bulk loader's own error as
    /// [`CacheError::DataSourceFailure`].
    pub async fn batch_get_or_load<T, F, Fut>(
        &self,
        keys: &[String],
        ttl: Option<Duration>,
        bulk_loader: F,
    ) -> CacheResult<HashMap<String, CacheStatus<T>>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce(Vec<String>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<HashMap<String, T>>> + Send,
    {
        let mut results = self.batch_get::<T>(keys).await?;
        let missing: Vec<String> = keys.iter().filter(|k| !results.contains_key(*k)).cloned().collect();

        if missing.is_empty() {
            return Ok(results);
        }

        let loaded = bulk_loader(missing.clone())
            .await
            .map_err(CacheError::DataSourceFailure)?;

        let backfills = missing.iter().map(|key| {
            let full_key = self.full_key(key);
            let lock_key = self.lock_key(key);
            let loaded_value = loaded.get(key).cloned();
            async move {
                let cancel = CancellationToken::new();
                match loaded_value {
                    Some(value) => {
                        if let Ok(wire) = self.encode(key, &value) {
                            let ttl = ttl.unwrap_or(self.config.default_ttl);
                            let _ = self
                                .put_locked(&full_key, &lock_key, Slot::Value(wire), ttl, &cancel)
                                .await;
                        }
                        (key.clone(), Some(CacheStatus::Found(value)))
                    }
                    None => {
                        if self.config.negative_caching.enabled {
                            let _ = self
                                .put_locked(
                                    &full_key,
                                    &lock_key,
                                    Slot::Tombstone,
                                    self.config.negative_caching.ttl,
                                    &cancel,
                                )
                                .await;
                            (key.clone(), Some(CacheStatus::KnownAbsent))
                        } else {
                            (key.clone(), None)
                        }
                    }
                }
            }
        });

        for (key, status) in join_all(backfills).await {
            if let Some(status) = status {
                results.insert(key, status);
            }
        }

        Ok(results)
    }

    /// Removes each key from L1 individually, then issues one `multiDelete`
    /// against L2. Returns the number L2 reported removed.
    ///
    /// # Errors
    ///
    /// Never returns an error; remote failures are absorbed and reported
    /// as `0`.
    pub async fn batch_invalidate(&self, keys: &[String]) -> CacheResult<usize> {
        if let Some(local) = &self.local {
            for key in keys {
                local.remove(&self.full_key(key)).await;
            }
        }
        let Some(remote) = &self.remote else {
            return Ok(0);
        };
        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        match remote.multi_delete(&full_keys).await {
            Ok(count) => Ok(count),
            Err(err) => {
                warn!(error = %err, "remote multi_delete failed");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DashMapLocalStore;
    use crate::codecs::JsonCodec;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct FakeRemoteStore {
        values: DashMap<String, Vec<u8>>,
        locks: DashMap<String, String>,
        set_calls: AtomicU32,
        fail_gets: std::sync::Mutex<u32>,
    }

    #[async_trait]
    impl RemoteStore for FakeRemoteStore {
        async fn get(&self, full_key: &str) -> CacheResult<Option<Vec<u8>>> {
            {
                let mut fails = self.fail_gets.lock().unwrap();
                if *fails > 0 {
                    *fails -= 1;
                    return Err(CacheError::RemoteUnavailable("injected failure".to_string()));
                }
            }
            Ok(self.values.get(full_key).map(|v| v.clone()))
        }
        async fn set(&self, full_key: &str, wire: &[u8], _ttl: Duration) -> CacheResult<()> {
            self.values.insert(full_key.to_string(), wire.to_vec());
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn set_if_absent(&self, full_key: &str, wire: &[u8], _ttl: Duration) -> CacheResult<bool> {
            match self.values.entry(full_key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(wire.to_vec());
                    Ok(true)
                }
            }
        }
        async fn delete(&self, full_key: &str) -> CacheResult<bool> {
            Ok(self.values.remove(full_key).is_some())
        }
        async fn multi_get(&self, full_keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
            Ok(full_keys.iter().map(|k| self.values.get(k).map(|v| v.clone())).collect())
        }
        async fn multi_delete(&self, full_keys: &[String]) -> CacheResult<usize> {
            Ok(full_keys.iter().filter(|k| self.values.remove(*k).is_some()).count())
        }
        async fn ping(&self) -> CacheResult<Duration> {
            Ok(Duration::from_millis(1))
        }
        async fn take_lock(&self, lock_key: &str, token: &str, _guard: Duration) -> CacheResult<bool> {
            match self.locks.entry(lock_key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(token.to_string());
                    Ok(true)
                }
            }
        }
        async fn release_lock(&self, lock_key: &str, token: &str) -> CacheResult<bool> {
            match self.locks.get(lock_key) {
                Some(existing) if existing.value() == token => {
                    drop(existing);
                    self.locks.remove(lock_key);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn test_engine() -> CacheEngine<JsonCodec> {
        let hooks = Arc::new(HookRegistry::new());
        let local = Arc::new(DashMapLocalStore::new(hooks.clone()));
        let remote = Arc::new(FakeRemoteStore::default());
        CacheEngine::new(
            CacheConfig::default().with_namespace("test"),
            JsonCodec::default(),
            Some(local),
            Some(remote),
            hooks,
        )
    }

    #[tokio::test]
    async fn get_on_empty_cache_is_not_found() {
        let engine = test_engine();
        let status: CacheStatus<String> = engine.get("missing").await.unwrap();
        assert_eq!(status, CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let engine = test_engine();
        engine.put("k", &"hello".to_string(), None).await.unwrap();
        let status: CacheStatus<String> = engine.get("k").await.unwrap();
        assert_eq!(status, CacheStatus::Found("hello".to_string()));
    }

    #[tokio::test]
    async fn get_or_load_calls_loader_exactly_once_on_miss() {
        let engine = test_engine();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let status = engine
            .get_or_load("k", None, move |_key| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("loaded".to_string()))
                }
            })
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Found("loaded".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A second call should hit the cache and never touch the loader again.
        let status2 = engine
            .get_or_load("k", None, move |_key| async move {
                panic!("loader should not run on a cache hit");
                #[allow(unreachable_code)]
                Ok(None::<String>)
            })
            .await
            .unwrap();
        assert_eq!(status2, CacheStatus::Found("loaded".to_string()));
    }

    #[tokio::test]
    async fn get_or_load_caches_tombstone_on_miss_when_negative_caching_enabled() {
        let engine = test_engine();
        let status: CacheStatus<String> = engine
            .get_or_load("absent", None, |_key| async move { Ok(None) })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::KnownAbsent);

        let status2: CacheStatus<String> = engine.get("absent").await.unwrap();
        assert_eq!(status2, CacheStatus::KnownAbsent);
    }

    #[tokio::test]
    async fn get_or_load_propagates_data_source_failure() {
        let engine = test_engine();
        let result: CacheResult<CacheStatus<String>> = engine
            .get_or_load("k", None, |_key| async move { Err(anyhow::anyhow!("db down")) })
            .await;
        assert!(matches!(result, Err(CacheError::DataSourceFailure(_))));
    }

    #[tokio::test]
    async fn invalidate_removes_from_both_tiers() {
        let engine = test_engine();
        engine.put("k", &"v".to_string(), None).await.unwrap();
        engine.invalidate("k").await.unwrap();
        let status: CacheStatus<String> = engine.get("k").await.unwrap();
        assert_eq!(status, CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn update_invalidates_after_data_source_write() {
        let engine = test_engine();
        engine.put("k", &"stale".to_string(), None).await.unwrap();

        engine
            .update("k", "new".to_string(), |_key, _value| async move { Ok(()) })
            .await
            .unwrap();

        let status: CacheStatus<String> = engine.get("k").await.unwrap();
        assert_eq!(status, CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn batch_get_or_load_backfills_only_missing_keys() {
        let engine = test_engine();
        engine.put("a", &"cached".to_string(), None).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string()];
        let results = engine
            .batch_get_or_load(&keys, None, |missing| async move {
                assert_eq!(missing, vec!["b".to_string()]);
                let mut map = HashMap::new();
                map.insert("b".to_string(), "loaded".to_string());
                Ok(map)
            })
            .await
            .unwrap();

        assert_eq!(results.get("a"), Some(&CacheStatus::Found("cached".to_string())));
        assert_eq!(results.get("b"), Some(&CacheStatus::Found("loaded".to_string())));
    }

    #[tokio::test]
    async fn get_absorbs_remote_transport_errors_as_miss() {
        let hooks = Arc::new(HookRegistry::new());
        let local = Arc::new(DashMapLocalStore::new(hooks.clone()));
        let remote = Arc::new(FakeRemoteStore {
            fail_gets: std::sync::Mutex::new(1),
            ..Default::default()
        });
        let engine = CacheEngine::new(
            CacheConfig::default().with_namespace("test"),
            JsonCodec::default(),
            Some(local),
            Some(remote),
            hooks,
        );

        let status: CacheStatus<String> = engine.get("k").await.unwrap();
        assert_eq!(status, CacheStatus::NotFound);
    }
}
