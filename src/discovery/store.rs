//! Key-value store seam consumed by the resolver.
//!
//! # Responsibilities
//! - Consistent range read of every key under a prefix
//! - Prefix-scoped subscription yielding ordered change events
//!
//! # Design Decisions
//! - The persistence engine is opaque; only these two reads are required
//! - Revisions let the resolver stitch a range read and a subscription
//!   together without gaps or double application

use async_trait::async_trait;
use thiserror::Error;

use crate::discovery::feed::ChangeFeed;

/// Failure reported by a store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,

    #[error("store request timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result of a prefix range read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResponse {
    /// Raw key-value pairs under the prefix.
    pub entries: Vec<(String, String)>,
    /// Store revision the read was served at.
    pub revision: i64,
}

/// A store holding endpoint registrations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read every key under `prefix` at a single revision.
    async fn range(&self, prefix: &str) -> Result<RangeResponse, StoreError>;

    /// Subscribe to mutations under `prefix`, starting from now.
    async fn subscribe(&self, prefix: &str) -> Result<ChangeFeed, StoreError>;

    /// Called once by each resolver that stops using the store.
    ///
    /// A store may be shared by several resolvers (the registry hands the
    /// same instance to every channel on a scheme), so implementations must
    /// release only per-subscriber resources here. The connection belongs to
    /// whoever constructed the store and is released when it is dropped.
    async fn close(&self) {}
}
