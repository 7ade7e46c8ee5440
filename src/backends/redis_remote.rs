//! Redis-backed remote store — the default L2/remote tier.
//!
//! Grounded in the grounding crate's `backends/redis_cache.rs`
//! (`ConnectionManager`, cursor-based `SCAN`, bulk `DEL`), extended with
//! the operations the remote-store collaborator contract requires that
//! the grounding crate's `RedisCache` never implemented: `set_if_absent`,
//! `multi_get`, and the lock primitives. The lock primitives (`SET ... NX
//! EX` acquire, Lua `EVAL` compare-and-delete release) are grounded in
//! `harborgrid-justin-caddy`'s `src/scheduling/scheduler.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::traits::RemoteStore;

/// Compare-and-delete: only removes `lock_key` if its value still equals
/// the caller's token. Mirrors `harborgrid-justin-caddy`'s scheduler lock
/// release script.
const RELEASE_LOCK_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
";

/// Redis-backed remote store with `ConnectionManager` for automatic
/// reconnection.
pub struct RedisRemoteStore {
    conn_manager: ConnectionManager,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl RedisRemoteStore {
    /// Connect using the `REDIS_URL` environment variable, falling back to
    /// `redis://127.0.0.1:6379`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the connection
    /// fails.
    pub async fn new() -> anyhow::Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Connect to a specific Redis URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the connection
    /// fails.
    pub async fn with_url(redis_url: &str) -> anyhow::Result<Self> {
        info!(redis_url = %redis_url, "initializing remote (Redis) store");

        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(redis_url = %redis_url, "remote (Redis) store connected");

        Ok(Self {
            conn_manager,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        })
    }

    /// Scan keys matching a glob-style pattern (`*`, `?`, `[]`) using the
    /// non-blocking cursor-based `SCAN` command.
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis command fails.
    pub async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let result: (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            cursor = result.0;
            keys.extend(result.1);

            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, count = keys.len(), "remote store: scanned keys matching pattern");
        Ok(keys)
    }
}

fn transport_err(context: &str, err: redis::RedisError) -> CacheError {
    CacheError::RemoteUnavailable(format!("{context}: {err}"))
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, full_key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        match conn.get::<_, Option<Vec<u8>>>(full_key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(err) => Err(transport_err("GET", err)),
        }
    }

    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(full_key, wire, ttl.as_secs().max(1))
            .await
            .map_err(|err| transport_err("SETEX", err))?;
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %full_key, ttl_secs = %ttl.as_secs(), "remote store: cached key with TTL");
        Ok(())
    }

    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(full_key)
            .arg(wire)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|err| transport_err("SET NX EX", err))?;
        Ok(reply.is_some())
    }

    async fn delete(&self, full_key: &str) -> CacheResult<bool> {
        let mut conn = self.conn_manager.clone();
        let removed: u64 = conn
            .del(full_key)
            .await
            .map_err(|err| transport_err("DEL", err))?;
        Ok(removed > 0)
    }

    async fn multi_get(&self, full_keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        if full_keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn_manager.clone();
        let values: Vec<Option<Vec<u8>>> = conn
            .mget(full_keys)
            .await
            .map_err(|err| transport_err("MGET", err))?;
        Ok(values)
    }

    async fn multi_delete(&self, full_keys: &[String]) -> CacheResult<usize> {
        if full_keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn_manager.clone();
        let count: usize = conn
            .del(full_keys)
            .await
            .map_err(|err| transport_err("DEL (bulk)", err))?;
        debug!(count = count, "remote store: removed keys in bulk");
        Ok(count)
    }

    async fn ping(&self) -> CacheResult<Duration> {
        let mut conn = self.conn_manager.clone();
        let start = std::time::Instant::now();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|err| transport_err("PING", err))?;
        Ok(start.elapsed())
    }

    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration) -> CacheResult<bool> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(guard.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|err| transport_err("SET NX EX (lock)", err))?;
        Ok(reply.is_some())
    }

    async fn release_lock(&self, lock_key: &str, token: &str) -> CacheResult<bool> {
        let mut conn = self.conn_manager.clone();
        let result: i64 = redis::cmd("EVAL")
            .arg(RELEASE_LOCK_SCRIPT)
            .arg(1)
            .arg(lock_key)
            .arg(token)
            .query_async(&mut conn)
            .await
            .map_err(|err| transport_err("EVAL (release lock)", err))?;
        Ok(result == 1)
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}

/// Thin wrapper making it easy to share one `RedisRemoteStore` across a
/// cache engine and any supplemental feature (invalidation pub/sub,
/// health probes) that also needs raw Redis access.
pub type SharedRedisRemoteStore = Arc<RedisRemoteStore>;
