//! Weighted random load balancing strategy.
//!
//! Each pick draws `r` uniformly from `[0, total_weight)` and walks the
//! connections in build order, subtracting weights until `r` goes negative.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{PickError, Picker, PickerBuilder, ReadyConnection, WeightPolicy};

/// Immutable weighted picker over one ready set.
#[derive(Debug)]
pub struct WeightedPicker<C> {
    connections: Vec<ReadyConnection<C>>,
    total_weight: u64,
    rng: Mutex<StdRng>,
}

impl<C> WeightedPicker<C> {
    pub fn new(ready: Vec<ReadyConnection<C>>, policy: WeightPolicy) -> Self {
        Self::with_rng(ready, policy, StdRng::from_entropy())
    }

    /// Deterministic picker for reproducible selection sequences.
    pub fn with_seed(ready: Vec<ReadyConnection<C>>, policy: WeightPolicy, seed: u64) -> Self {
        Self::with_rng(ready, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ready: Vec<ReadyConnection<C>>, policy: WeightPolicy, rng: StdRng) -> Self {
        let connections: Vec<_> = ready
            .into_iter()
            .map(|c| ReadyConnection::new(c.handle, policy.normalize(c.weight)))
            .collect();
        let total_weight = connections.iter().map(|c| u64::from(c.weight)).sum();
        Self {
            connections,
            total_weight,
            rng: Mutex::new(rng),
        }
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Connections with their normalized weights, in selection order.
    pub fn connections(&self) -> &[ReadyConnection<C>] {
        &self.connections
    }

    fn draw(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..self.total_weight)
    }
}

impl<C: Clone + Send + Sync> Picker<C> for WeightedPicker<C> {
    fn pick(&self) -> Result<C, PickError> {
        let last = self.connections.last().ok_or(PickError::NoEndpointsAvailable)?;

        let mut remaining = self.draw();
        for connection in &self.connections {
            let weight = u64::from(connection.weight);
            if remaining < weight {
                return Ok(connection.handle.clone());
            }
            remaining -= weight;
        }
        // draw < total_weight, so the walk always returns above
        Ok(last.handle.clone())
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}

/// Builds [`WeightedPicker`]s with a fixed weight policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedBuilder {
    policy: WeightPolicy,
}

impl WeightedBuilder {
    pub const NAME: &'static str = "weight";

    pub fn new(policy: WeightPolicy) -> Self {
        Self { policy }
    }
}

impl<C: Clone + Send + Sync + 'static> PickerBuilder<C> for WeightedBuilder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build(&self, ready: Vec<ReadyConnection<C>>) -> Box<dyn Picker<C>> {
        tracing::debug!(ready = ready.len(), "Building weighted picker");
        Box::new(WeightedPicker::new(ready, self.policy))
    }
}
