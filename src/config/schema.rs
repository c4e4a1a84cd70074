//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for discovery.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::ResolverOptions;
use crate::load_balancer::WeightPolicy;
use crate::resilience::Backoff;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Key-value store connection settings.
    pub store: StoreConfig,

    /// Service to resolve and how to balance across it.
    pub target: TargetConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Weight defaults and clamping.
    pub weights: WeightConfig,

    /// Backoff for re-establishing a lost change feed.
    pub resync: ResyncConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl DiscoveryConfig {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            read_timeout: Duration::from_secs(self.timeouts.read_secs),
            feed_idle_timeout: match self.timeouts.feed_idle_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            default_weight: self.weights.default_weight,
            backoff: Backoff::new(
                Duration::from_millis(self.resync.base_delay_ms),
                Duration::from_millis(self.resync.max_delay_ms),
            ),
        }
    }

    pub fn weight_policy(&self) -> WeightPolicy {
        WeightPolicy {
            min_weight: self.weights.min_weight,
            max_weight: self.weights.max_weight,
        }
    }
}

/// Which store implementation backs discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store seeded from `seed`.
    #[default]
    Memory,
    /// etcd cluster at `endpoints` (requires the `etcd` feature).
    Etcd,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Store endpoints (e.g., "localhost:2379").
    pub endpoints: Vec<String>,

    /// Entries written to the memory store at startup.
    pub seed: Vec<SeedEntry>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            endpoints: vec!["localhost:2379".to_string()],
            seed: Vec::new(),
        }
    }
}

/// A key-value pair preloaded into the memory store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedEntry {
    pub key: String,
    #[serde(default = "default_seed_value")]
    pub value: String,
}

fn default_seed_value() -> String {
    "1".to_string()
}

/// Target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Scheme; also the first prefix segment.
    pub scheme: String,

    /// Service name; the second prefix segment.
    pub service: String,

    /// Registered balancer name ("weight" or "round_robin").
    pub balancer: String,
}

impl TargetConfig {
    /// `scheme:///service`
    pub fn uri(&self) -> String {
        format!("{}:///{}", self.scheme, self.service)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            scheme: "grpclb".to_string(),
            service: "simple_grpc".to_string(),
            balancer: "weight".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Store connection establishment timeout in seconds.
    pub dial_secs: u64,

    /// Bound on the prefix scan plus subscription in seconds.
    pub read_secs: u64,

    /// Re-establish the feed after this many quiet seconds (0 = never).
    pub feed_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_secs: 5,
            read_secs: 5,
            feed_idle_secs: 0,
        }
    }
}

/// Weight configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Weight for values that are not decimal integers.
    pub default_weight: u32,

    /// Floor applied by the picker (weights below it are raised).
    pub min_weight: u32,

    /// Optional cap applied by the picker.
    pub max_weight: Option<u32>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            default_weight: 1,
            min_weight: 1,
            max_weight: None,
        }
    }
}

/// Re-subscription backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResyncConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
