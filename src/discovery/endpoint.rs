//! Endpoint and snapshot types.
//!
//! # Key Space
//! ```text
//! <prefix>/<identity> = <decimal weight>
//! /grpclb/simple_grpc/10.0.0.1:8000 = "3"
//! ```
//! A value that is not a non-negative decimal integer falls back to the
//! default weight.

use std::sync::Arc;

use serde::Serialize;

use crate::discovery::DiscoveryError;
use crate::observability::metrics;

/// Weight used when a stored value cannot be parsed.
pub const DEFAULT_WEIGHT: u32 = 1;

/// One network-reachable instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    /// Network address, unique within a prefix.
    pub identity: String,
    /// Selection weight as stored (normalization happens in the picker).
    pub weight: u32,
}

impl Endpoint {
    pub fn new(identity: impl Into<String>, weight: u32) -> Self {
        Self {
            identity: identity.into(),
            weight,
        }
    }

    /// Build an endpoint from a raw key-value pair under `prefix`.
    ///
    /// Returns `None` when the key does not belong to the prefix or names
    /// nothing after it. A malformed weight is not a reason to skip the key.
    pub fn from_entry(prefix: &str, key: &str, value: &str, default_weight: u32) -> Option<Self> {
        let identity = identity_of(prefix, key)?;
        let weight = match parse_weight(value) {
            Ok(weight) => weight,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, default_weight, "Using default weight");
                metrics::record_malformed_entry();
                default_weight
            }
        };
        Some(Self::new(identity, weight))
    }
}

/// Strip `prefix` from `key`, rejecting keys outside the namespace.
pub fn identity_of<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    match key.strip_prefix(prefix) {
        Some(identity) if !identity.is_empty() => Some(identity),
        _ => {
            tracing::warn!(prefix = %prefix, key = %key, "Ignoring key outside watched prefix");
            None
        }
    }
}

/// Parse a stored weight value.
pub fn parse_weight(value: &str) -> Result<u32, DiscoveryError> {
    value.parse::<u32>().map_err(|_| DiscoveryError::MalformedEntry {
        value: value.to_string(),
    })
}

/// Encode a weight the way the registration side stores it.
pub fn encode_weight(weight: u32) -> String {
    weight.to_string()
}

/// The complete endpoint set at one point in time.
///
/// Cloning is cheap; the endpoint list is shared and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Snapshot {
    endpoints: Arc<[Endpoint]>,
    revision: i64,
}

impl Snapshot {
    pub fn new(endpoints: Vec<Endpoint>, revision: i64) -> Self {
        Self {
            endpoints: endpoints.into(),
            revision,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Store revision this snapshot reflects.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.identity == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_round_trip() {
        for weight in [0, 1, 3, 5, 100, u32::MAX] {
            assert_eq!(parse_weight(&encode_weight(weight)).unwrap(), weight);
        }
    }

    #[test]
    fn test_malformed_weight_defaults() {
        for value in ["", "abc", "-3", "1.5", " 2"] {
            let e = Endpoint::from_entry("/svc/", "/svc/10.0.0.1:8000", value, DEFAULT_WEIGHT).unwrap();
            assert_eq!(e.weight, 1, "value {:?}", value);
        }
        assert!(matches!(parse_weight("x"), Err(DiscoveryError::MalformedEntry { .. })));
    }

    #[test]
    fn test_identity_stripping() {
        let e = Endpoint::from_entry("/svc/", "/svc/10.0.0.1:8000", "3", DEFAULT_WEIGHT).unwrap();
        assert_eq!(e.identity, "10.0.0.1:8000");
        assert_eq!(e.weight, 3);

        assert!(Endpoint::from_entry("/svc/", "/other/10.0.0.1:8000", "3", 1).is_none());
        assert!(Endpoint::from_entry("/svc/", "/svc/", "3", 1).is_none());
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = Snapshot::new(vec![Endpoint::new("a", 3), Endpoint::new("b", 1)], 7);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.revision(), 7);
        assert_eq!(snapshot.get("b").map(|e| e.weight), Some(1));
        assert!(snapshot.get("c").is_none());
    }
}
