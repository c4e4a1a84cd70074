//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot published by the resolver
//!     → pool.rs (Balancer: connect new identities, drop departed ones)
//!     → ready set of (handle, weight) pairs (backend.rs)
//!     → PickerBuilder builds a fresh picker:
//!         - weighted.rs (weighted random, default)
//!         - round_robin.rs (rotation, ignores weights)
//!     → picker swapped in atomically
//!     → pick() per outbound call
//! ```
//!
//! # Design Decisions
//! - Pickers are immutable; a rebuild replaces, never mutates
//! - In-flight picks finish against the picker they loaded
//! - An empty ready set yields an explicit error; callers never block
//! - Weight travels with the handle, no side-table lookups

pub mod backend;
pub mod pool;
pub mod round_robin;
pub mod weighted;

pub use backend::{ReadyConnection, WeightPolicy};
pub use pool::{Balancer, Connector};
pub use round_robin::{RoundRobinBuilder, RoundRobinPicker};
pub use weighted::{WeightedBuilder, WeightedPicker};

use thiserror::Error;

/// Per-call selection failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PickError {
    #[error("no endpoints available")]
    NoEndpointsAvailable,
}

/// Selects one connection per outbound call.
pub trait Picker<C>: Send + Sync {
    fn pick(&self) -> Result<C, PickError>;

    /// Number of connections this picker selects from.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a picker from the current ready set.
pub trait PickerBuilder<C>: Send + Sync {
    /// Name the builder is registered under.
    fn name(&self) -> &'static str;

    fn build(&self, ready: Vec<ReadyConnection<C>>) -> Box<dyn Picker<C>>;
}
