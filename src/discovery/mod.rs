//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (external) writes <prefix>/<identity> = <weight>
//!     → store.rs (KeyValueStore: range read + prefix subscription)
//!     → feed.rs (ChangeFeed: ordered Put/Delete events)
//!     → resolver.rs (apply each event in arrival order)
//!     → table.rs (AddressTable, swapped as an immutable map)
//!     → Snapshot published to the UpdateListener
//! ```
//!
//! # Design Decisions
//! - The store is an opaque seam; `memory.rs` and `etcd.rs` implement it
//! - Every mutation publishes the full endpoint set, never a delta
//! - Re-subscription always re-scans the prefix before resuming
//! - Steady-state failures are absorbed; only Build surfaces errors

pub mod endpoint;
pub mod feed;
pub mod memory;
pub mod resolver;
pub mod store;
pub mod table;
pub mod target;

#[cfg(feature = "etcd")]
pub mod etcd;

pub use endpoint::{Endpoint, Snapshot};
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use memory::MemoryStore;
pub use resolver::{Resolver, ResolverOptions, UpdateListener};
pub use store::{KeyValueStore, RangeResponse, StoreError};
pub use table::AddressTable;
pub use target::Target;

use thiserror::Error;

/// Errors produced by the discovery core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The initial scan or the first subscription could not be established.
    #[error("discovery unavailable for {prefix}: {reason}")]
    DiscoveryUnavailable { prefix: String, reason: String },

    /// The change subscription was lost and must be re-established.
    #[error("change feed interrupted: {0}")]
    FeedInterrupted(String),

    /// The change feed ended or did not produce an event in time.
    #[error("change feed closed")]
    FeedClosed,

    /// A stored weight could not be parsed.
    #[error("malformed weight {value:?}")]
    MalformedEntry { value: String },
}

impl DiscoveryError {
    pub(crate) fn unavailable(prefix: &str, reason: impl std::fmt::Display) -> Self {
        DiscoveryError::DiscoveryUnavailable {
            prefix: prefix.to_string(),
            reason: reason.to_string(),
        }
    }
}
