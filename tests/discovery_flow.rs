//! End-to-end discovery and balancing scenarios.

use std::sync::Arc;

use weighted_discovery::discovery::{ChangeEvent, MemoryStore, Resolver};
use weighted_discovery::load_balancer::{Connector, Picker, ReadyConnection, WeightPolicy, WeightedPicker};
use weighted_discovery::{Endpoint, Registry, ResolverOptions};

mod common;
use common::{fast_options, pairs, Recorder, ScriptedStore};

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put("/svc/10.0.0.1:8000", "3");
    store.put("/svc/10.0.0.2:8000", "1");
    store
}

#[tokio::test]
async fn test_seed_delete_and_pick() {
    let store = seeded_store();
    let recorder = Recorder::new();

    let (resolver, initial) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();
    assert_eq!(
        pairs(&initial),
        vec![("10.0.0.1:8000".to_string(), 3), ("10.0.0.2:8000".to_string(), 1)]
    );
    assert_eq!(recorder.count(), 1);

    store.delete("/svc/10.0.0.1:8000");
    let snapshot = recorder.wait_for(|s| s.len() == 1).await;
    assert_eq!(pairs(&snapshot), vec![("10.0.0.2:8000".to_string(), 1)]);

    let ready = snapshot
        .endpoints()
        .iter()
        .map(|e| ReadyConnection::new(e.identity.clone(), e.weight))
        .collect();
    let picker = WeightedPicker::new(ready, WeightPolicy::default());
    for _ in 0..1000 {
        assert_eq!(picker.pick().unwrap(), "10.0.0.2:8000");
    }

    resolver.close().await;
}

#[tokio::test]
async fn test_weight_update_keeps_identity_unique() {
    let store = seeded_store();
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc/", recorder.clone(), fast_options())
        .await
        .unwrap();

    store.put("/svc/10.0.0.2:8000", "5");
    let snapshot = recorder
        .wait_for(|s| s.get("10.0.0.2:8000").map(|e| e.weight) == Some(5))
        .await;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(resolver.snapshot().len(), 2);
    resolver.close().await;
}

#[tokio::test]
async fn test_absent_delete_and_odd_keys_are_absorbed() {
    let store = ScriptedStore::new(&[("/svc/a", "2")], 10);
    let recorder = Recorder::new();
    let (resolver, initial) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();
    assert_eq!(initial.revision(), 10);

    // Covered by the scan: skipped.
    store.send(ChangeEvent::put("/svc/a", "9", 10));
    // Unknown identity: no-op.
    store.send(ChangeEvent::delete("/svc/ghost", 11));
    // Outside the prefix: ignored.
    store.send(ChangeEvent::put("/other/b", "1", 12));
    // Malformed weight: default applies.
    store.send(ChangeEvent::put("/svc/c", "heavy", 13));

    let snapshot = recorder.wait_for(|s| s.get("c").is_some()).await;
    assert_eq!(pairs(&snapshot), vec![("a".to_string(), 2), ("c".to_string(), 1)]);
    assert_eq!(snapshot.revision(), 13);
    // Initial publication plus the one for "c".
    assert_eq!(recorder.count(), 2);

    resolver.close().await;
}

#[tokio::test]
async fn test_keys_sharing_a_revision_all_apply() {
    let store = ScriptedStore::new(&[("/svc/a", "1"), ("/svc/b", "1")], 10);
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    // One transaction (e.g. a lease revoke) removes both keys at revision 11.
    store.send(ChangeEvent::delete("/svc/a", 11));
    store.send(ChangeEvent::delete("/svc/b", 11));
    store.send(ChangeEvent::put("/svc/c", "2", 12));
    store.send(ChangeEvent::put("/svc/d", "3", 12));

    let snapshot = recorder.wait_for(|s| s.get("d").is_some()).await;
    assert_eq!(pairs(&snapshot), vec![("c".to_string(), 2), ("d".to_string(), 3)]);
    assert_eq!(snapshot.revision(), 12);
    resolver.close().await;
}

#[tokio::test]
async fn test_snapshots_follow_commit_order() {
    let store = Arc::new(MemoryStore::new());
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    for weight in 1..=50 {
        store.put("/svc/a", weight.to_string());
    }
    store.put("/svc/b", "1");
    recorder.wait_for(|s| s.len() == 2).await;

    let history = recorder.history();
    assert!(history.windows(2).all(|w| w[0].revision() <= w[1].revision()));
    assert_eq!(resolver.snapshot().get("a").unwrap().weight, 50);
    resolver.close().await;
}

#[tokio::test]
async fn test_resolve_now_rescans() {
    let store = seeded_store();
    let recorder = Recorder::new();
    let (resolver, _) = Resolver::build(store.clone(), "/svc", recorder.clone(), fast_options())
        .await
        .unwrap();

    resolver.resolve_now();
    let deadline = tokio::time::Instant::now() + common::WAIT;
    while recorder.count() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "re-scan never published");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(recorder.history()[1].len(), 2);
    resolver.close().await;
}

#[tokio::test]
async fn test_channel_distributes_by_weight() {
    let mut registry = Registry::with_defaults(WeightPolicy::default());
    let store = Arc::new(MemoryStore::new());
    store.put("/grpclb/simple_grpc/A", "3");
    store.put("/grpclb/simple_grpc/B", "1");
    registry.register_store("grpclb", store.clone());

    let connector: Arc<dyn Connector<String>> = Arc::new(|e: &Endpoint| e.identity.clone());
    let channel = registry
        .dial("grpclb:///simple_grpc", "weight", connector, ResolverOptions::default())
        .await
        .unwrap();

    let n = 40_000;
    let a = (0..n).filter(|_| channel.pick().unwrap() == "A").count();
    let freq = a as f64 / n as f64;
    assert!((freq - 0.75).abs() < 0.02, "frequency {}", freq);

    // New endpoints reach the picker through the resolver.
    store.put("/grpclb/simple_grpc/C", "1");
    let deadline = tokio::time::Instant::now() + common::WAIT;
    while channel.balancer().current_picker().len() < 3 {
        assert!(tokio::time::Instant::now() < deadline, "picker never rebuilt");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    channel.close().await;
}
