//! Ready connections and weight normalization.

/// A connection the transport considers usable, paired with its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyConnection<C> {
    pub handle: C,
    pub weight: u32,
}

impl<C> ReadyConnection<C> {
    pub fn new(handle: C, weight: u32) -> Self {
        Self { handle, weight }
    }
}

/// How stored weights map to selection weights.
///
/// Weights below `min_weight` (including zero) are raised to it; the floor is
/// never below 1. `max_weight` caps weights only when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightPolicy {
    pub min_weight: u32,
    pub max_weight: Option<u32>,
}

impl WeightPolicy {
    /// Floor-only policy.
    pub fn floor(min_weight: u32) -> Self {
        Self {
            min_weight,
            max_weight: None,
        }
    }

    /// Floor and cap, e.g. `clamped(1, 5)`.
    pub fn clamped(min_weight: u32, max_weight: u32) -> Self {
        Self {
            min_weight,
            max_weight: Some(max_weight),
        }
    }

    pub fn normalize(&self, weight: u32) -> u32 {
        let floor = self.min_weight.max(1);
        let weight = weight.max(floor);
        match self.max_weight {
            Some(max) => weight.min(max.max(floor)),
            None => weight,
        }
    }
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self::floor(1)
    }
}
