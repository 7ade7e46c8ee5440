//! Remote Lock Facility: short-lived exclusive tokens in the remote tier.
//!
//! The acquisition primitive itself (`SET key token NX EX guard` plus a
//! compare-and-delete release) lives on the concrete [`RemoteStore`]
//! (see `backends/redis_remote.rs`), grounded in
//! `harborgrid-justin-caddy`'s `scheduling/scheduler.rs`. This module is
//! the generic polling facade the engine calls: it owns the poll loop and
//! the caller-identity token, not the wire protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;
use uuid::Uuid;

use crate::traits::RemoteStore;

/// Polls a [`RemoteStore`]'s lock primitive until acquired or the wait
/// budget elapses.
pub struct RemoteLock {
    remote: Arc<dyn RemoteStore>,
    poll_interval: Duration,
}

impl RemoteLock {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>, poll_interval: Duration) -> Self {
        Self {
            remote,
            poll_interval,
        }
    }

    /// Try to acquire the lock for `lock_key`, polling at `poll_interval`
    /// until `wait_budget` elapses. Returns `None` on timeout or any
    /// transport error — both degrade the caller to a lock-free path,
    /// never a fatal error (spec: "any transport error surfaces as
    /// not-acquired").
    pub async fn acquire(&self, lock_key: &str, wait_budget: Duration, guard: Duration) -> Option<RemoteLockGuard> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait_budget;

        loop {
            match self.remote.take_lock(lock_key, &token, guard).await {
                Ok(true) => {
                    return Some(RemoteLockGuard {
                        remote: self.remote.clone(),
                        lock_key: lock_key.to_string(),
                        token,
                    })
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(lock_key = %lock_key, error = %err, "remote lock acquisition failed, degrading to lock-free path");
                    return None;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// An acquired remote lock. Must be released by its originator; the guard
/// TTL on the remote side guarantees progress even if this is dropped
/// without calling [`RemoteLockGuard::release`].
pub struct RemoteLockGuard {
    remote: Arc<dyn RemoteStore>,
    lock_key: String,
    token: String,
}

impl RemoteLockGuard {
    /// Release the lock. Best-effort: a failure here is logged, not
    /// propagated, since the guard TTL bounds the damage.
    pub async fn release(self) {
        match self.remote.release_lock(&self.lock_key, &self.token).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(lock_key = %self.lock_key, "remote lock release found a different token; another holder may have taken over after guard expiry");
            }
            Err(err) => {
                warn!(lock_key = %self.lock_key, error = %err, "remote lock release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheResult;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRemote {
        locks: DashMap<String, String>,
        fail_takes: Mutex<u32>,
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn get(&self, _full_key: &str) -> CacheResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set(&self, _full_key: &str, _wire: &[u8], _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }
        async fn set_if_absent(&self, _full_key: &str, _wire: &[u8], _ttl: Duration) -> CacheResult<bool> {
            Ok(true)
        }
        async fn delete(&self, _full_key: &str) -> CacheResult<bool> {
            Ok(true)
        }
        async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
            Ok(vec![None; keys.len()])
        }
        async fn multi_delete(&self, keys: &[String]) -> CacheResult<usize> {
            Ok(keys.len())
        }
        async fn ping(&self) -> CacheResult<Duration> {
            Ok(Duration::from_millis(1))
        }
        async fn take_lock(&self, lock_key: &str, token: &str, _guard: Duration) -> CacheResult<bool> {
            {
                let mut fails = self.fail_takes.lock().unwrap();
                if *fails > 0 {
                    *fails -= 1;
                    return Ok(false);
                }
            }
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
    }

    #[tokio::test]
    async fn acquire_then_release_allows_a_second_acquire() {
        let remote = Arc::new(FakeRemote::default());
        let lock = RemoteLock::new(remote, Duration::from_millis(5));

        let guard = lock
            .acquire("lock:ns:k", Duration::from_millis(100), Duration::from_secs(5))
            .await
            .expect("first acquire should succeed");
        guard.release().await;

        let guard2 = lock
            .acquire("lock:ns:k", Duration::from_millis(100), Duration::from_secs(5))
            .await;
        assert!(guard2.is_some());
    }

    #[tokio::test]
    async fn acquire_polls_past_transient_contention() {
        let remote = Arc::new(FakeRemote {
            fail_takes: Mutex::new(2),
            ..Default::default()
        });
        let lock = RemoteLock::new(remote, Duration::from_millis(5));

        let guard = lock
            .acquire("lock:ns:k", Duration::from_millis(200), Duration::from_secs(5))
            .await;
        assert!(guard.is_some());
    }
}
