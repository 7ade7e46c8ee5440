//! Integration tests for write-through invalidation and the optional
//! cross-instance Pub/Sub broadcast (spec section 8, scenario 4 and
//! `invalidation.rs`'s supplemental feature).

mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tandem_cache::{CacheStatus, InvalidationConfig, InvalidationMessage, InvalidationPublisher, InvalidationSubscriber};
use tokio::time::sleep;

#[tokio::test]
async fn update_writes_through_then_invalidates() {
    let cache = setup_cache().await.expect("cache setup");
    let key = test_key("update");
    let stale = test_data::User::new(1);
    let fresh = test_data::User::new(2);

    cache.engine.put(&key, &stale, None).await.expect("put");

    cache
        .engine
        .update(&key, fresh, |_key, _value| async move {
            // Stand-in for the authoritative write (database commit, etc).
            Ok(())
        })
        .await
        .expect("update");

    // `update` invalidates rather than writing the new value through, to
    // avoid the stale-cache race where the source commit outlives the
    // cache write (spec 4.6.6).
    let status: CacheStatus<test_data::User> = cache.engine.get(&key).await.expect("get");
    assert_eq!(status, CacheStatus::NotFound);
}

#[tokio::test]
async fn reload_bypasses_both_tiers_and_writes_through() {
    let cache = setup_cache().await.expect("cache setup");
    let key = test_key("reload");
    let stale = test_data::User::new(3);
    let fresh = test_data::User::new(4);

    cache.engine.put(&key, &stale, None).await.expect("put");

    let status = cache
        .engine
        .reload(&key, None, {
            let fresh = fresh.clone();
            move |_key| async move { Ok(Some(fresh)) }
        })
        .await
        .expect("reload");
    assert_eq!(status, CacheStatus::Found(fresh.clone()));

    let status2: CacheStatus<test_data::User> = cache.engine.get(&key).await.expect("get");
    assert_eq!(status2, CacheStatus::Found(fresh));
}

#[tokio::test]
async fn put_if_absent_only_takes_effect_once() {
    let cache = setup_cache().await.expect("cache setup");
    let key = test_key("absent");
    let first = test_data::User::new(5);
    let second = test_data::User::new(6);

    let took_effect = cache
        .engine
        .put_if_absent(&key, &first, None)
        .await
        .expect("put_if_absent");
    assert!(took_effect);

    let took_effect2 = cache
        .engine
        .put_if_absent(&key, &second, None)
        .await
        .expect("put_if_absent");
    assert!(!took_effect2);

    // L1 was never eagerly written by put_if_absent; the next `get`
    // populates it from L2 (spec 4.6.4).
    let status: CacheStatus<test_data::User> = cache.engine.get(&key).await.expect("get");
    assert_eq!(status, CacheStatus::Found(first));
}

#[tokio::test]
async fn batch_invalidate_removes_all_keys() {
    let cache = setup_cache().await.expect("cache setup");
    let keys: Vec<String> = (0..5).map(|i| test_key(&format!("bulk{i}"))).collect();

    for (i, key) in keys.iter().enumerate() {
        cache.engine.put(key, &test_data::User::new(i as u64), None).await.expect("put");
    }

    let removed = cache.engine.batch_invalidate(&keys).await.expect("batch_invalidate");
    assert_eq!(removed, keys.len());

    for key in &keys {
        let status: CacheStatus<test_data::User> = cache.engine.get(key).await.expect("get");
        assert_eq!(status, CacheStatus::NotFound);
    }
}

#[tokio::test]
async fn cross_instance_pubsub_broadcast_is_received() {
    let config = InvalidationConfig {
        channel: format!("test:invalidate:{}", rand::random::<u32>()),
        ..InvalidationConfig::default()
    };

    let subscriber = InvalidationSubscriber::new(&redis_url(), config.clone()).expect("subscriber");
    let received = Arc::new(AtomicU32::new(0));
    let received_clone = received.clone();

    let _handle = subscriber.start(move |message| {
        let received = received_clone.clone();
        async move {
            if matches!(message, InvalidationMessage::Remove { .. }) {
                received.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    });

    // Give the subscriber's background task time to subscribe before we publish.
    sleep(Duration::from_millis(200)).await;

    let client = redis::Client::open(redis_url()).expect("redis client");
    let conn_manager = redis::aio::ConnectionManager::new(client)
        .await
        .expect("connection manager");
    let mut publisher = InvalidationPublisher::new(conn_manager, config);
    publisher
        .publish(&InvalidationMessage::remove("some-key"))
        .await
        .expect("publish");

    sleep(Duration::from_millis(200)).await;
    subscriber.shutdown();

    assert_eq!(received.load(Ordering::SeqCst), 1);
}
