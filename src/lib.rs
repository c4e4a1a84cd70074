//! Weighted service discovery.
//!
//! Keeps a client's view of "which endpoints implement service S" current
//! from a prefix-scoped key space, and picks one endpoint per call in
//! proportion to its weight.

pub mod client;
pub mod config;
pub mod discovery;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use client::{Channel, DialError, Registry};
pub use config::DiscoveryConfig;
pub use discovery::{DiscoveryError, Endpoint, Resolver, ResolverOptions, Snapshot};
pub use load_balancer::{Balancer, PickError, Picker, WeightedPicker};
