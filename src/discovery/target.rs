//! Dial targets and watched prefixes.
//!
//! A target `grpclb:///simple_grpc` watches the prefix `/grpclb/simple_grpc/`.

use std::fmt;

/// A parsed `scheme:///service` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    pub service: String,
}

impl Target {
    pub fn new(scheme: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            service: service.into(),
        }
    }

    /// Parse `scheme:///service` (an authority between `//` and `/` is ignored).
    pub fn parse(raw: &str) -> Option<Self> {
        let (scheme, rest) = raw.split_once("://")?;
        let service = match rest.split_once('/') {
            Some((_authority, service)) => service,
            None => rest,
        };
        let service = service.trim_matches('/');
        if scheme.is_empty() || service.is_empty() {
            return None;
        }
        Some(Self::new(scheme, service))
    }

    /// Key-space prefix under which this service's endpoints are registered.
    pub fn prefix(&self) -> String {
        normalize_prefix(&format!("/{}/{}", self.scheme, self.service))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:///{}", self.scheme, self.service)
    }
}

/// Ensure a prefix ends with exactly one `/`.
pub fn normalize_prefix(raw: &str) -> String {
    format!("{}/", raw.trim_end_matches('/'))
}
