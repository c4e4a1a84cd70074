//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{PickError, Picker, PickerBuilder, ReadyConnection};

/// Round-robin selector.
/// Rotates through the ready set with an internal counter; weights are ignored.
#[derive(Debug)]
pub struct RoundRobinPicker<C> {
    handles: Vec<C>,
    counter: AtomicUsize,
}

impl<C> RoundRobinPicker<C> {
    pub fn new(ready: Vec<ReadyConnection<C>>) -> Self {
        Self {
            handles: ready.into_iter().map(|c| c.handle).collect(),
            counter: AtomicUsize::new(0),
        }
    }
}

impl<C: Clone + Send + Sync> Picker<C> for RoundRobinPicker<C> {
    fn pick(&self) -> Result<C, PickError> {
        if self.handles.is_empty() {
            return Err(PickError::NoEndpointsAvailable);
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        Ok(self.handles[index].clone())
    }

    fn len(&self) -> usize {
        self.handles.len()
    }
}

/// Builds [`RoundRobinPicker`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinBuilder;

impl RoundRobinBuilder {
    pub const NAME: &'static str = "round_robin";
}

impl<C: Clone + Send + Sync + 'static> PickerBuilder<C> for RoundRobinBuilder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build(&self, ready: Vec<ReadyConnection<C>>) -> Box<dyn Picker<C>> {
        Box::new(RoundRobinPicker::new(ready))
    }
}
