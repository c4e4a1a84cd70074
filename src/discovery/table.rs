//! Address table: identity → endpoint.
//!
//! # Responsibilities
//! - Hold the current endpoint set for one prefix
//! - Apply upserts and removals from the resolver task
//! - Produce consistent snapshots concurrently with the writer
//!
//! # Design Decisions
//! - Contents live in an immutable map behind `ArcSwap`; each write
//!   publishes a new map, so a reader never observes a half-applied change
//! - Ordered map keeps snapshot order stable across publications

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::discovery::endpoint::{Endpoint, Snapshot};

#[derive(Debug, Clone, Default)]
struct Entries {
    endpoints: BTreeMap<String, Endpoint>,
    revision: i64,
}

/// Thread-safe endpoint table shared by the resolver and snapshot readers.
#[derive(Debug, Default)]
pub struct AddressTable {
    inner: ArcSwap<Entries>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an endpoint, returning the previous value.
    pub fn upsert(&self, endpoint: Endpoint, revision: i64) -> Option<Endpoint> {
        let mut previous = None;
        self.inner.rcu(|current| {
            let mut next = Entries::clone(current);
            previous = next.endpoints.insert(endpoint.identity.clone(), endpoint.clone());
            next.revision = next.revision.max(revision);
            next
        });
        previous
    }

    /// Remove an endpoint. Removing an absent identity changes nothing.
    pub fn remove(&self, identity: &str, revision: i64) -> Option<Endpoint> {
        let mut removed = None;
        self.inner.rcu(|current| {
            let mut next = Entries::clone(current);
            removed = next.endpoints.remove(identity);
            next.revision = next.revision.max(revision);
            next
        });
        removed
    }

    /// Replace the whole table in one swap (used after a re-scan).
    pub fn replace_all(&self, endpoints: impl IntoIterator<Item = Endpoint>, revision: i64) {
        let endpoints = endpoints
            .into_iter()
            .map(|e| (e.identity.clone(), e))
            .collect();
        self.inner.store(Arc::new(Entries { endpoints, revision }));
    }

    pub fn snapshot(&self) -> Snapshot {
        let entries = self.inner.load();
        Snapshot::new(entries.endpoints.values().cloned().collect(), entries.revision)
    }

    pub fn get(&self, identity: &str) -> Option<Endpoint> {
        self.inner.load().endpoints.get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.load().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest store revision applied so far.
    pub fn revision(&self) -> i64 {
        self.inner.load().revision
    }
}
