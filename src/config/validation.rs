//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, weight bounds ordered)
//! - Check the target can form a key prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DiscoveryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{DiscoveryConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must not contain '/'")]
    ContainsSlash { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("weights.min_weight ({min}) exceeds weights.max_weight ({max})")]
    WeightBounds { min: u32, max: u32 },

    #[error("resync.base_delay_ms ({base}) exceeds resync.max_delay_ms ({max})")]
    BackoffBounds { base: u64, max: u64 },

    #[error("store.endpoints must list at least one endpoint for the etcd backend")]
    NoStoreEndpoints,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &DiscoveryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("target.scheme", &config.target.scheme),
        ("target.service", &config.target.service),
        ("target.balancer", &config.target.balancer),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Empty { field });
        }
    }
    if config.target.scheme.contains('/') {
        errors.push(ValidationError::ContainsSlash { field: "target.scheme" });
    }

    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.read_secs" });
    }
    if config.timeouts.dial_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.dial_secs" });
    }

    if let Some(max) = config.weights.max_weight {
        if config.weights.min_weight > max {
            errors.push(ValidationError::WeightBounds {
                min: config.weights.min_weight,
                max,
            });
        }
    }

    if config.resync.base_delay_ms > config.resync.max_delay_ms {
        errors.push(ValidationError::BackoffBounds {
            base: config.resync.base_delay_ms,
            max: config.resync.max_delay_ms,
        });
    }

    if config.store.backend == StoreBackend::Etcd && config.store.endpoints.is_empty() {
        errors.push(ValidationError::NoStoreEndpoints);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
