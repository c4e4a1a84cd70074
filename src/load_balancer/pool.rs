//! Connection pool and picker swapping.
//!
//! # Responsibilities
//! - Turn each published snapshot into a set of connection handles
//! - Track transport readiness per identity
//! - Rebuild and atomically swap the picker on every change
//!
//! # Design Decisions
//! - Rebuilds are serialized by a mutex; `pick` only loads the current
//!   picker and never touches that mutex
//! - Handles for identities that leave the snapshot are dropped
//! - Weights come from the snapshot, so a weight-only update rebuilds the
//!   picker without reconnecting

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::discovery::{Endpoint, Snapshot, UpdateListener};
use crate::load_balancer::{PickError, Picker, PickerBuilder, ReadyConnection};
use crate::observability::metrics;

/// Creates a connection handle for a newly discovered endpoint.
pub trait Connector<C>: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> C;
}

impl<C, F> Connector<C> for F
where
    F: Fn(&Endpoint) -> C + Send + Sync,
{
    fn connect(&self, endpoint: &Endpoint) -> C {
        self(endpoint)
    }
}

#[derive(Debug, Clone)]
struct Connection<C> {
    handle: C,
    ready: bool,
}

/// Connection-management glue between the resolver and the call path.
pub struct Balancer<C> {
    builder: Arc<dyn PickerBuilder<C>>,
    connector: Arc<dyn Connector<C>>,
    connections: DashMap<String, Connection<C>>,
    snapshot: ArcSwap<Snapshot>,
    picker: ArcSwap<Box<dyn Picker<C>>>,
    rebuild: Mutex<()>,
}

impl<C: Clone + Send + Sync + 'static> Balancer<C> {
    pub fn new(builder: Arc<dyn PickerBuilder<C>>, connector: Arc<dyn Connector<C>>) -> Self {
        let picker = builder.build(Vec::new());
        Self {
            builder,
            connector,
            connections: DashMap::new(),
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            picker: ArcSwap::from_pointee(picker),
            rebuild: Mutex::new(()),
        }
    }

    /// Select a connection for one outbound call.
    pub fn pick(&self) -> Result<C, PickError> {
        let result = self.picker.load().pick();
        metrics::record_pick(result.is_ok());
        result
    }

    /// The picker currently serving calls.
    pub fn current_picker(&self) -> Arc<Box<dyn Picker<C>>> {
        self.picker.load_full()
    }

    /// The last snapshot applied.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::clone(&self.snapshot.load())
    }

    /// Report that the transport can carry calls to `identity` again.
    pub fn mark_ready(&self, identity: &str) -> bool {
        self.set_ready(identity, true)
    }

    /// Report that the transport lost its connection to `identity`.
    pub fn mark_unavailable(&self, identity: &str) -> bool {
        self.set_ready(identity, false)
    }

    /// Number of connections currently eligible for selection.
    pub fn ready_count(&self) -> usize {
        self.connections.iter().filter(|c| c.ready).count()
    }

    fn set_ready(&self, identity: &str, ready: bool) -> bool {
        let _guard = self.lock_rebuild();
        let changed = match self.connections.get_mut(identity) {
            Some(mut connection) if connection.ready != ready => {
                connection.ready = ready;
                true
            }
            _ => false,
        };
        if changed {
            tracing::info!(identity = %identity, ready, "Connection readiness changed");
            self.rebuild_picker();
        }
        changed
    }

    fn apply_snapshot(&self, snapshot: Snapshot) {
        let _guard = self.lock_rebuild();

        let live: HashSet<&str> = snapshot.endpoints().iter().map(|e| e.identity.as_str()).collect();
        self.connections.retain(|identity, _| {
            let keep = live.contains(identity.as_str());
            if !keep {
                tracing::info!(identity = %identity, "Dropping connection for departed endpoint");
            }
            keep
        });
        for endpoint in snapshot.endpoints() {
            if !self.connections.contains_key(&endpoint.identity) {
                tracing::info!(identity = %endpoint.identity, weight = endpoint.weight, "Connecting new endpoint");
                let handle = self.connector.connect(endpoint);
                self.connections
                    .insert(endpoint.identity.clone(), Connection { handle, ready: true });
            }
        }

        self.snapshot.store(Arc::new(snapshot));
        self.rebuild_picker();
    }

    /// Caller must hold the rebuild lock.
    fn rebuild_picker(&self) {
        let snapshot = self.snapshot.load();
        let ready: Vec<_> = snapshot
            .endpoints()
            .iter()
            .filter_map(|endpoint| {
                self.connections
                    .get(&endpoint.identity)
                    .filter(|c| c.ready)
                    .map(|c| ReadyConnection::new(c.handle.clone(), endpoint.weight))
            })
            .collect();

        metrics::record_ready_connections(ready.len());
        tracing::debug!(
            balancer = self.builder.name(),
            ready = ready.len(),
            revision = snapshot.revision(),
            "Rebuilding picker"
        );
        self.picker.store(Arc::new(self.builder.build(ready)));
    }

    fn lock_rebuild(&self) -> std::sync::MutexGuard<'_, ()> {
        self.rebuild.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Clone + Send + Sync + 'static> UpdateListener for Balancer<C> {
    fn on_update(&self, snapshot: Snapshot) {
        self.apply_snapshot(snapshot);
    }
}

impl<C: Clone + Send + Sync + 'static> std::fmt::Debug for Balancer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("balancer", &self.builder.name())
            .field("connections", &self.connections.len())
            .finish()
    }
}
