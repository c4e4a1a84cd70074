//! Client-side entry point.
//!
//! # Data Flow
//! ```text
//! Registry::dial("grpclb:///simple_grpc", "weight", connector)
//!     → target parsed, store looked up by scheme
//!     → Balancer built from the named PickerBuilder
//!     → Resolver built with the Balancer as its listener
//!     → Channel { resolver, balancer }
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit value owned by the caller, not global state
//! - Channel::close closes the resolver; picks keep using the last picker

pub mod registry;

pub use registry::Registry;

use std::sync::Arc;

use thiserror::Error;

use crate::discovery::{DiscoveryError, Resolver, Snapshot, Target};
use crate::load_balancer::{Balancer, PickError};

/// Failure to set up a channel.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid target {0:?}, expected scheme:///service")]
    InvalidTarget(String),

    #[error("no store registered for scheme {0:?}")]
    UnknownScheme(String),

    #[error("no balancer registered under {0:?}")]
    UnknownBalancer(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A resolved, load-balanced view of one service.
pub struct Channel<C> {
    target: Target,
    resolver: Resolver,
    balancer: Arc<Balancer<C>>,
}

impl<C: Clone + Send + Sync + 'static> Channel<C> {
    pub(crate) fn new(target: Target, resolver: Resolver, balancer: Arc<Balancer<C>>) -> Self {
        Self {
            target,
            resolver,
            balancer,
        }
    }

    /// Select a connection for one call.
    pub fn pick(&self) -> Result<C, PickError> {
        self.balancer.pick()
    }

    /// Endpoint set currently known to the resolver.
    pub fn snapshot(&self) -> Snapshot {
        self.resolver.snapshot()
    }

    pub fn resolve_now(&self) {
        self.resolver.resolve_now();
    }

    pub fn balancer(&self) -> &Arc<Balancer<C>> {
        &self.balancer
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub async fn close(&self) {
        self.resolver.close().await;
    }
}

impl<C: Clone + Send + Sync + 'static> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("target", &self.target.to_string())
            .field("resolver", &self.resolver)
            .field("balancer", &self.balancer)
            .finish()
    }
}
