//! Discovery resolver.
//!
//! # Responsibilities
//! - Seed the address table from a consistent prefix scan
//! - Apply change events strictly in arrival order from one background task
//! - Publish the full snapshot after every applied mutation
//! - Recover from lost feeds by re-scanning before resuming
//!
//! # Lifecycle
//! ```text
//! build:   subscribe → range → seed table → publish → spawn watch task
//! steady:  event → apply → publish
//! lost:    backoff → subscribe → range → replace table → publish
//! close:   signal task → await task → close store
//! ```

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;

use crate::discovery::endpoint::{identity_of, Endpoint, Snapshot, DEFAULT_WEIGHT};
use crate::discovery::feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::discovery::store::{KeyValueStore, StoreError};
use crate::discovery::table::AddressTable;
use crate::discovery::target::normalize_prefix;
use crate::discovery::DiscoveryError;
use crate::observability::metrics;
use crate::resilience::Backoff;

/// Receives every snapshot the resolver publishes, in publication order.
pub trait UpdateListener: Send + Sync {
    fn on_update(&self, snapshot: Snapshot);
}

impl UpdateListener for watch::Sender<Snapshot> {
    fn on_update(&self, snapshot: Snapshot) {
        self.send_replace(snapshot);
    }
}

impl<L: UpdateListener + ?Sized> UpdateListener for Arc<L> {
    fn on_update(&self, snapshot: Snapshot) {
        (**self).on_update(snapshot)
    }
}

/// Tunables supplied by the caller.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Bound on establishing a subscription plus the range read.
    pub read_timeout: Duration,
    /// Longest quiet period tolerated on the feed before it is re-established.
    pub feed_idle_timeout: Option<Duration>,
    /// Weight assigned to entries whose value does not parse.
    pub default_weight: u32,
    /// Schedule for re-establishing a lost feed.
    pub backoff: Backoff,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            feed_idle_timeout: None,
            default_weight: DEFAULT_WEIGHT,
            backoff: Backoff::default(),
        }
    }
}

/// Keeps the endpoint set for one prefix current.
pub struct Resolver {
    prefix: String,
    table: Arc<AddressTable>,
    store: Arc<dyn KeyValueStore>,
    rescan: Arc<Notify>,
    shutdown: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Resolver {
    /// Scan `prefix`, publish the initial snapshot and start watching.
    ///
    /// Fails with [`DiscoveryError::DiscoveryUnavailable`] if the scan or the
    /// subscription cannot be completed within `options.read_timeout`.
    pub async fn build(
        store: Arc<dyn KeyValueStore>,
        prefix: &str,
        listener: Arc<dyn UpdateListener>,
        options: ResolverOptions,
    ) -> Result<(Self, Snapshot), DiscoveryError> {
        let prefix = normalize_prefix(prefix);
        tracing::info!(prefix = %prefix, "Building resolver");

        let table = Arc::new(AddressTable::new());
        let rescan = Arc::new(Notify::new());
        let watch_loop = WatchLoop {
            prefix: prefix.clone(),
            store: store.clone(),
            table: table.clone(),
            listener,
            options,
            rescan: rescan.clone(),
            scanned_through: AtomicI64::new(0),
        };

        let feed = watch_loop.reconcile().await.map_err(|e| {
            tracing::error!(prefix = %prefix, error = %e, "Initial discovery failed");
            DiscoveryError::unavailable(&prefix, e)
        })?;
        let snapshot = watch_loop.publish();

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(watch_loop.run(feed, shutdown_rx));

        let resolver = Self {
            prefix,
            table,
            store,
            rescan,
            shutdown,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        };
        Ok((resolver, snapshot))
    }

    /// Ask for fresher data: the watch task re-scans the prefix.
    pub fn resolve_now(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.rescan.notify_one();
        }
    }

    /// Stop the watch task and release this resolver's hold on the store.
    /// Safe to call repeatedly.
    ///
    /// The store itself may be shared with other resolvers; see
    /// [`KeyValueStore::close`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(());

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(prefix = %self.prefix, error = %e, "Watch task ended abnormally");
            }
        }

        self.store.close().await;
        tracing::info!(prefix = %self.prefix, "Resolver closed");
    }

    /// Current table contents.
    pub fn snapshot(&self) -> Snapshot {
        self.table.snapshot()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("prefix", &self.prefix)
            .field("endpoints", &self.table.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

enum Wake {
    Event(Result<ChangeEvent, DiscoveryError>),
    Rescan,
}

/// State owned by the background task; the only writer of the table.
struct WatchLoop {
    prefix: String,
    store: Arc<dyn KeyValueStore>,
    table: Arc<AddressTable>,
    listener: Arc<dyn UpdateListener>,
    options: ResolverOptions,
    rescan: Arc<Notify>,
    /// Revision of the most recent prefix scan. Several keys may share one
    /// revision, so only this bound decides what the scan already covered.
    scanned_through: AtomicI64,
}

impl WatchLoop {
    async fn run(self, mut feed: ChangeFeed, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(prefix = %self.prefix, "Watching prefix");

        loop {
            let wake = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = self.rescan.notified() => Wake::Rescan,
                result = self.next_event(&mut feed) => Wake::Event(result),
            };

            match wake {
                Wake::Event(Ok(event)) => {
                    if self.apply(event) {
                        self.publish();
                    }
                }
                Wake::Event(Err(e)) => {
                    tracing::warn!(prefix = %self.prefix, error = %e, "Change feed lost, re-scanning");
                    metrics::record_feed_interruption(&self.prefix);
                    match self.resync(&mut shutdown).await {
                        Some(next) => {
                            feed = next;
                            self.publish();
                        }
                        None => break,
                    }
                }
                Wake::Rescan => {
                    tracing::debug!(prefix = %self.prefix, "Re-scan requested");
                    match self.resync(&mut shutdown).await {
                        Some(next) => {
                            feed = next;
                            self.publish();
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::debug!(prefix = %self.prefix, "Watch task stopped");
    }

    async fn next_event(&self, feed: &mut ChangeFeed) -> Result<ChangeEvent, DiscoveryError> {
        match self.options.feed_idle_timeout {
            Some(idle) => feed.next_within(idle).await,
            None => feed.next().await,
        }
    }

    /// Subscribe, then scan, then replace the table with the scan result.
    ///
    /// Subscribing first means anything committed after the scan is already
    /// buffered on the new feed; `apply` skips what the scan covered.
    async fn reconcile(&self) -> Result<ChangeFeed, StoreError> {
        let establish = async {
            let feed = self.store.subscribe(&self.prefix).await?;
            let range = self.store.range(&self.prefix).await?;
            Ok::<_, StoreError>((feed, range))
        };
        let (feed, range) = tokio::time::timeout(self.options.read_timeout, establish)
            .await
            .map_err(|_| StoreError::Timeout)??;

        let endpoints = range.entries.iter().filter_map(|(key, value)| {
            Endpoint::from_entry(&self.prefix, key, value, self.options.default_weight)
        });
        self.table.replace_all(endpoints, range.revision);
        self.scanned_through.store(range.revision, Ordering::SeqCst);

        tracing::info!(
            prefix = %self.prefix,
            revision = range.revision,
            endpoints = self.table.len(),
            "Prefix scanned"
        );
        Ok(feed)
    }

    /// Re-establish the feed, retrying with backoff until it works or the
    /// resolver is closed.
    async fn resync(&self, shutdown: &mut broadcast::Receiver<()>) -> Option<ChangeFeed> {
        let mut attempt = 0;
        loop {
            let delay = self.options.backoff.delay(attempt);
            let attempt_result = async {
                tokio::time::sleep(delay).await;
                self.reconcile().await
            };

            tokio::select! {
                biased;
                _ = shutdown.recv() => return None,
                result = attempt_result => match result {
                    Ok(feed) => return Some(feed),
                    Err(e) => {
                        attempt += 1;
                        tracing::warn!(
                            prefix = %self.prefix,
                            attempt,
                            error = %e,
                            "Re-scan failed, backing off"
                        );
                    }
                },
            }
        }
    }

    /// Apply one event. Returns false when the event changed nothing.
    fn apply(&self, event: ChangeEvent) -> bool {
        if event.revision <= self.scanned_through.load(Ordering::SeqCst) {
            tracing::trace!(key = %event.key, revision = event.revision, "Skipping event covered by scan");
            return false;
        }

        match event.kind {
            ChangeKind::Put { value } => {
                let Some(endpoint) =
                    Endpoint::from_entry(&self.prefix, &event.key, &value, self.options.default_weight)
                else {
                    return false;
                };
                tracing::info!(
                    identity = %endpoint.identity,
                    weight = endpoint.weight,
                    revision = event.revision,
                    "Endpoint put"
                );
                self.table.upsert(endpoint, event.revision);
                true
            }
            ChangeKind::Delete => {
                let Some(identity) = identity_of(&self.prefix, &event.key) else {
                    return false;
                };
                let removed = self.table.remove(identity, event.revision);
                tracing::info!(
                    identity = %identity,
                    present = removed.is_some(),
                    revision = event.revision,
                    "Endpoint deleted"
                );
                removed.is_some()
            }
        }
    }

    fn publish(&self) -> Snapshot {
        let snapshot = self.table.snapshot();
        metrics::record_snapshot(&self.prefix, snapshot.len());
        tracing::debug!(
            prefix = %self.prefix,
            revision = snapshot.revision(),
            endpoints = snapshot.len(),
            "Publishing snapshot"
        );
        self.listener.on_update(snapshot.clone());
        snapshot
    }
}
