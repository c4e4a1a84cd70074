//! Failure injection tests for discovery.

use std::sync::Arc;
use std::time::Duration;

use weighted_discovery::discovery::{MemoryStore, Resolver};
use weighted_discovery::{DiscoveryError, ResolverOptions};

mod common;
use common::{fast_options, Recorder};

#[tokio::test]
async fn test_build_fails_when_store_unavailable() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);

    let err = Resolver::build(store, "/svc", Recorder::new(), fast_options())
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::DiscoveryUnavailable { ref prefix, .. } if prefix == "/svc/"));
}

#[tokio::test]
async fn test_build_times_out() {
    let store = Arc::new(MemoryStore::new());
    store.set_range_delay(Duration::from_millis(500));
    let recorder = Recorder::new();

    let options = ResolverOptions {
        read_timeout: Duration::from_millis(50),
        ..fast_options()
    };
    let err = Resolver::build(store, "/svc", recorder.clone(), options)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::DiscoveryUnavailable { .. }));
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn test_feed_loss_rescans_missed_changes() {
    let store = Arc::new(MemoryStore::new());
    store.put("/svc/a", "1");
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    // Feed dies and cannot be re-established while changes land.
    store.set_available(false);
    store.interrupt_feeds();
    store.put("/svc/b", "4");
    store.delete("/svc/a");
    tokio::time::sleep(Duration::from_millis(100)).await;
    store.set_available(true);

    let snapshot = recorder
        .wait_for(|s| s.get("b").is_some() && s.get("a").is_none())
        .await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get("b").unwrap().weight, 4);

    // Incremental application resumes after recovery.
    store.put("/svc/c", "2");
    recorder.wait_for(|s| s.get("c").is_some()).await;
    resolver.close().await;
}

#[tokio::test]
async fn test_lagging_feed_recovers() {
    let store = Arc::new(MemoryStore::with_capacity(2));
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    for i in 0..20 {
        store.put(format!("/svc/10.0.0.{}:8000", i), "1");
    }

    recorder.wait_for(|s| s.len() == 20).await;
    resolver.close().await;
}

#[tokio::test]
async fn test_close_stops_publication() {
    let store = Arc::new(MemoryStore::new());
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    resolver.close().await;
    resolver.close().await;
    assert!(resolver.is_closed());
    assert_eq!(store.close_count(), 1);
    assert_eq!(store.subscriber_count(), 0);

    let published = recorder.count();
    store.put("/svc/late", "1");
    resolver.resolve_now();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count(), published);
}

#[tokio::test]
async fn test_close_cancels_resync_backoff() {
    let store = Arc::new(MemoryStore::new());
    store.put("/svc/a", "1");
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    // Leave the watch task retrying against a dead store.
    store.set_available(false);
    store.interrupt_feeds();
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(1), resolver.close())
        .await
        .expect("close blocked on resync");
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(store.close_count(), 1);

    let published = recorder.count();
    store.set_available(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count(), published);
}

#[tokio::test]
async fn test_idle_feed_is_reestablished() {
    let store = Arc::new(MemoryStore::new());
    let recorder = Recorder::new();
    let options = ResolverOptions {
        feed_idle_timeout: Some(Duration::from_millis(30)),
        ..fast_options()
    };
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), options)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(recorder.count() > 1);

    store.put("/svc/a", "1");
    recorder.wait_for(|s| s.len() == 1).await;
    resolver.close().await;
}

#[tokio::test]
async fn test_drop_stops_watch_task() {
    let store = Arc::new(MemoryStore::new());
    let (resolver, _) = Resolver::build(store.clone(), "/svc", Recorder::new(), fast_options())
        .await
        .unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(resolver);
    let deadline = tokio::time::Instant::now() + common::WAIT;
    while store.subscriber_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "watch task leaked");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
