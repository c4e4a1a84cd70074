//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{mpsc, watch};

use weighted_discovery::discovery::{
    ChangeEvent, ChangeFeed, KeyValueStore, RangeResponse, StoreError, UpdateListener,
};
use weighted_discovery::resilience::Backoff;
use weighted_discovery::{DiscoveryError, ResolverOptions, Snapshot};

pub const WAIT: Duration = Duration::from_secs(3);

/// Options tuned for fast recovery in tests.
pub fn fast_options() -> ResolverOptions {
    ResolverOptions {
        read_timeout: Duration::from_secs(1),
        backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(50)),
        ..ResolverOptions::default()
    }
}

/// Listener that keeps every published snapshot.
pub struct Recorder {
    history: Mutex<Vec<Snapshot>>,
    latest: watch::Sender<Snapshot>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        let (latest, _) = watch::channel(Snapshot::default());
        Arc::new(Self {
            history: Mutex::new(Vec::new()),
            latest,
        })
    }

    pub fn history(&self) -> Vec<Snapshot> {
        self.history.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Wait until the latest snapshot satisfies `pred`.
    pub async fn wait_for(&self, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let mut rx = self.latest.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if pred(&current) {
                return current;
            }
            tokio::time::timeout(WAIT, rx.changed())
                .await
                .expect("timed out waiting for snapshot")
                .expect("listener dropped");
        }
    }
}

impl UpdateListener for Recorder {
    fn on_update(&self, snapshot: Snapshot) {
        self.history.lock().unwrap().push(snapshot.clone());
        self.latest.send_replace(snapshot);
    }
}

/// Identity/weight pairs of a snapshot, in snapshot order.
pub fn pairs(snapshot: &Snapshot) -> Vec<(String, u32)> {
    snapshot
        .endpoints()
        .iter()
        .map(|e| (e.identity.clone(), e.weight))
        .collect()
}

/// Store whose feed is driven by hand, for events a real store never emits.
pub struct ScriptedStore {
    initial: RangeResponse,
    sender: Mutex<Option<mpsc::UnboundedSender<Result<ChangeEvent, DiscoveryError>>>>,
}

impl ScriptedStore {
    pub fn new(entries: &[(&str, &str)], revision: i64) -> Arc<Self> {
        Arc::new(Self {
            initial: RangeResponse {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                revision,
            },
            sender: Mutex::new(None),
        })
    }

    pub fn send(&self, event: ChangeEvent) {
        let sender = self.sender.lock().unwrap();
        sender
            .as_ref()
            .expect("no subscription yet")
            .send(Ok(event))
            .expect("feed dropped");
    }
}

#[async_trait]
impl KeyValueStore for ScriptedStore {
    async fn range(&self, _prefix: &str) -> Result<RangeResponse, StoreError> {
        Ok(self.initial.clone())
    }

    async fn subscribe(&self, _prefix: &str) -> Result<ChangeFeed, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        let feed = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(ChangeFeed::new(feed))
    }
}
