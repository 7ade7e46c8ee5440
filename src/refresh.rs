//! Refresh Scheduler: tracks entries eligible for proactive revalidation
//! and drives the engine's refresh path on a periodic tick.
//!
//! The grounding crate has no background-refresh equivalent; the
//! tracking map and tick loop are original to this core, built in the
//! grounding crate's task-spawning idiom — `invalidation.rs`'s
//! `InvalidationSubscriber::start()` spawns a tokio task with a
//! `broadcast` shutdown channel, and this scheduler follows the same
//! shape for its periodic tick instead of a pub/sub read loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::hooks::{EvictionHook, EvictionReason, LocalSetHook};

/// Per-key bookkeeping: how often to refresh, and when next due.
#[derive(Debug, Clone, Copy)]
struct RefreshRecord {
    interval: Duration,
    next_due_at: Instant,
}

/// Produces the refresh interval for a key. Defaults to a single global
/// interval; callers may supply a per-key policy.
pub trait RefreshPolicy: Send + Sync {
    fn interval_for(&self, key: &str) -> Duration;
}

/// The default policy: every key gets the same interval.
pub struct FixedInterval(pub Duration);

impl RefreshPolicy for FixedInterval {
    fn interval_for(&self, _key: &str) -> Duration {
        self.0
    }
}

/// Tracks which local-tier entries are due for proactive revalidation.
///
/// Holds only bookkeeping — the actual refresh (reading L2, falling back
/// to the data source, writing through) is driven by whoever owns the
/// tick loop (see [`RefreshScheduler::spawn`]), since only the engine
/// knows how to perform a refresh.
pub struct RefreshScheduler {
    records: DashMap<String, RefreshRecord>,
    policy: Arc<dyn RefreshPolicy>,
    tick_interval: Duration,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(policy: Arc<dyn RefreshPolicy>, tick_interval: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            records: DashMap::new(),
            policy,
            tick_interval,
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    /// Upsert a record for `key`, due after the policy's interval.
    pub fn track(&self, key: &str) {
        let interval = self.policy.interval_for(key);
        self.records.insert(
            key.to_string(),
            RefreshRecord {
                interval,
                next_due_at: Instant::now() + interval,
            },
        );
    }

    /// Remove a key from tracking.
    pub fn untrack(&self, key: &str) {
        self.records.remove(key);
    }

    /// Snapshot of keys whose `next_due_at` has passed.
    #[must_use]
    pub fn due_keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.records
            .iter()
            .filter(|entry| entry.next_due_at <= now)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Reset `key`'s `next_due_at` to `now + interval`, leaving the
    /// tracked interval unchanged.
    pub fn mark_refreshed(&self, key: &str) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.next_due_at = Instant::now() + record.interval;
        }
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// Spawn the periodic tick loop. `refresh_one` is invoked for every
    /// due key on each tick; failures are isolated per key (spec: "all
    /// exceptions inside a refresh of one key... never stop the tick loop
    /// or affect other keys").
    pub fn spawn<F, Fut>(self: &Arc<Self>, refresh_one: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
    {
        self.running.store(true, Ordering::SeqCst);
        let scheduler = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for key in scheduler.due_keys() {
                            if let Err(err) = refresh_one(key.clone()).await {
                                warn!(key = %key, error = %err, "background refresh failed for key, leaving entry untouched");
                            } else {
                                scheduler.mark_refreshed(&key);
                                debug!(key = %key, "background refresh completed");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        })
    }

    /// Signal the tick loop to stop.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.shutdown.send(());
        }
    }
}

impl LocalSetHook for RefreshScheduler {
    fn on_local_set(&self, key: &str) {
        self.track(key);
    }
}

impl EvictionHook for RefreshScheduler {
    fn on_eviction(&self, key: &str, reason: EvictionReason) {
        // Invariant (spec §3.4): a Refresh Record exists only while the
        // corresponding L1 entry is live, except when the eviction reason
        // is "replaced" — an overwrite keeps the same logical entry alive.
        if reason != EvictionReason::Replaced {
            self.untrack(key);
        }
    }
}
