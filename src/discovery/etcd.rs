//! etcd-backed store.
//!
//! Prefix range reads map to `Get` with `with_prefix`; subscriptions map to a
//! prefix `Watch`. Each watch response may carry several events, which are
//! flattened into the feed in order.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, ConnectOptions, EventType, GetOptions, WatchOptions, WatchStream, Watcher,
};
use futures_util::stream;

use crate::discovery::feed::{ChangeEvent, ChangeFeed};
use crate::discovery::store::{KeyValueStore, RangeResponse, StoreError};
use crate::discovery::DiscoveryError;

/// Store backed by an etcd v3 cluster.
///
/// The gRPC connection lives as long as the last clone of the store.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to `endpoints`, failing if no member answers within `dial_timeout`.
    pub async fn connect(endpoints: &[String], dial_timeout: Duration) -> Result<Self, StoreError> {
        let options = ConnectOptions::new()
            .with_connect_timeout(dial_timeout)
            .with_timeout(dial_timeout);
        let client = Client::connect(endpoints, Some(options))
            .await
            .map_err(backend_error)?;
        tracing::info!(endpoints = ?endpoints, "Connected to etcd");
        Ok(Self { client })
    }
}

fn backend_error(e: etcd_client::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

struct WatchState {
    // Dropping the watcher cancels the watch.
    _watcher: Watcher,
    stream: WatchStream,
    pending: VecDeque<ChangeEvent>,
}

#[async_trait]
impl KeyValueStore for EtcdStore {
    async fn range(&self, prefix: &str) -> Result<RangeResponse, StoreError> {
        let mut kv = self.client.kv_client();
        let resp = kv
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(backend_error)?;

        let revision = resp.header().map(|h| h.revision()).unwrap_or_default();
        let mut entries = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            match (kv.key_str(), kv.value_str()) {
                (Ok(key), Ok(value)) => entries.push((key.to_string(), value.to_string())),
                _ => tracing::warn!("Skipping non-UTF-8 entry under {}", prefix),
            }
        }
        Ok(RangeResponse { entries, revision })
    }

    async fn subscribe(&self, prefix: &str) -> Result<ChangeFeed, StoreError> {
        let mut watch = self.client.watch_client();
        let (watcher, stream) = watch
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(backend_error)?;

        let state = WatchState {
            _watcher: watcher,
            stream,
            pending: VecDeque::new(),
        };

        let feed = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((Ok(event), state));
                }
                match state.stream.message().await {
                    Ok(Some(resp)) => {
                        if resp.canceled() {
                            let err = DiscoveryError::FeedInterrupted(format!(
                                "watch canceled: {}",
                                resp.cancel_reason()
                            ));
                            return Some((Err(err), state));
                        }
                        for event in resp.events() {
                            let Some(kv) = event.kv() else { continue };
                            let Ok(key) = kv.key_str() else {
                                tracing::warn!(
                                    revision = kv.mod_revision(),
                                    "Skipping watch event with non-UTF-8 key"
                                );
                                continue;
                            };
                            let change = match event.event_type() {
                                EventType::Put => ChangeEvent::put(
                                    key,
                                    kv.value_str().unwrap_or_default(),
                                    kv.mod_revision(),
                                ),
                                EventType::Delete => ChangeEvent::delete(key, kv.mod_revision()),
                            };
                            state.pending.push_back(change);
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let err = DiscoveryError::FeedInterrupted(e.to_string());
                        return Some((Err(err), state));
                    }
                }
            }
        });
        Ok(ChangeFeed::new(feed))
    }

    async fn close(&self) {
        // Watches are canceled as their feeds drop; the client stays up for
        // other resolvers sharing this store.
        tracing::debug!("Resolver released etcd store");
    }
}
