//! In-process key-value store.
//!
//! Behaves like a single-node watchable store: a global revision counter,
//! ordered change events, and prefix-filtered subscriptions. Fault injection
//! hooks (`set_available`, `interrupt_feeds`, `set_range_delay`) let tests
//! and demos exercise the resolver's recovery paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{broadcast, watch};

use crate::discovery::feed::{ChangeEvent, ChangeFeed};
use crate::discovery::store::{KeyValueStore, RangeResponse, StoreError};
use crate::discovery::DiscoveryError;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, String>,
    revision: i64,
}

/// Watchable in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<ChangeEvent>,
    /// Bumped to terminate every live feed.
    epoch: watch::Sender<u64>,
    available: AtomicBool,
    range_delay_ms: AtomicU64,
    close_count: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a store whose subscribers may buffer at most `capacity` events
    /// before they are considered lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (epoch, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            events,
            epoch,
            available: AtomicBool::new(true),
            range_delay_ms: AtomicU64::new(0),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Write `key = value`, returning the commit revision.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> i64 {
        let key = key.into();
        let value = value.into();
        let mut state = self.lock_state();
        state.revision += 1;
        let revision = state.revision;
        state.entries.insert(key.clone(), value.clone());
        // Sent under the lock so subscribers see commit order.
        let _ = self.events.send(ChangeEvent::put(key, value, revision));
        revision
    }

    /// Delete `key`. Returns `None` (and emits nothing) if it was absent.
    pub fn delete(&self, key: &str) -> Option<i64> {
        let mut state = self.lock_state();
        state.entries.remove(key)?;
        state.revision += 1;
        let revision = state.revision;
        let _ = self.events.send(ChangeEvent::delete(key, revision));
        Some(revision)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock_state().entries.get(key).cloned()
    }

    pub fn revision(&self) -> i64 {
        self.lock_state().revision
    }

    /// Make range reads and new subscriptions fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// End every feed handed out so far.
    pub fn interrupt_feeds(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    /// Delay every range read by `delay`.
    pub fn set_range_delay(&self, delay: Duration) {
        self.range_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        // State is plain data; a panic elsewhere cannot leave it half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn range(&self, prefix: &str) -> Result<RangeResponse, StoreError> {
        let delay = self.range_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_available()?;

        let state = self.lock_state();
        let entries = state
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(RangeResponse {
            entries,
            revision: state.revision,
        })
    }

    async fn subscribe(&self, prefix: &str) -> Result<ChangeFeed, StoreError> {
        self.check_available()?;

        let events = self.events.subscribe();
        let epoch = self.epoch.subscribe();
        let prefix = prefix.to_string();

        let feed = stream::unfold(
            (events, epoch, prefix),
            |(mut events, mut epoch, prefix)| async move {
                loop {
                    tokio::select! {
                        _ = epoch.changed() => return None,
                        received = events.recv() => match received {
                            Ok(event) if event.key.starts_with(&prefix) => {
                                return Some((Ok(event), (events, epoch, prefix)));
                            }
                            Ok(_) => continue,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                let err = DiscoveryError::FeedInterrupted(format!(
                                    "subscriber lagged by {} events",
                                    skipped
                                ));
                                return Some((Err(err), (events, epoch, prefix)));
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        },
                    }
                }
            },
        );
        Ok(ChangeFeed::new(feed))
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::feed::ChangeKind;

    #[tokio::test]
    async fn test_range_is_prefix_scoped() {
        let store = MemoryStore::new();
        store.put("/svc/a", "1");
        store.put("/svc/b", "2");
        store.put("/svd/c", "3");

        let resp = store.range("/svc/").await.unwrap();
        assert_eq!(resp.entries.len(), 2);
        assert_eq!(resp.revision, 3);
    }

    #[tokio::test]
    async fn test_subscription_filters_and_orders() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe("/svc/").await.unwrap();

        store.put("/other/x", "1");
        store.put("/svc/a", "1");
        store.delete("/svc/a");

        let first = feed.next().await.unwrap();
        assert_eq!(first.key, "/svc/a");
        assert_eq!(first.revision, 2);
        assert_eq!(feed.next().await.unwrap().kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn test_delete_absent_emits_nothing() {
        let store = MemoryStore::new();
        assert_eq!(store.delete("/svc/missing"), None);
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_ends_feeds() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe("/svc/").await.unwrap();
        store.interrupt_feeds();
        assert_eq!(feed.next().await, Err(DiscoveryError::FeedClosed));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_interrupted() {
        let store = MemoryStore::with_capacity(2);
        let mut feed = store.subscribe("/svc/").await.unwrap();
        for i in 0..5 {
            store.put(format!("/svc/{}", i), "1");
        }
        assert!(matches!(feed.next().await, Err(DiscoveryError::FeedInterrupted(_))));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_eq!(store.range("/svc/").await, Err(StoreError::Unavailable));
        assert!(store.subscribe("/svc/").await.is_err());
    }
}
