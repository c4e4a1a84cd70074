//! Store and balancer registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{Channel, DialError};
use crate::discovery::{KeyValueStore, Resolver, ResolverOptions, Target, UpdateListener};
use crate::load_balancer::{
    Balancer, Connector, PickerBuilder, RoundRobinBuilder, WeightPolicy, WeightedBuilder,
};

/// Maps target schemes to stores and balancer names to picker builders.
pub struct Registry<C> {
    stores: HashMap<String, Arc<dyn KeyValueStore>>,
    balancers: HashMap<String, Arc<dyn PickerBuilder<C>>>,
}

impl<C: Clone + Send + Sync + 'static> Registry<C> {
    pub fn new() -> Self {
        Self {
            stores: HashMap::new(),
            balancers: HashMap::new(),
        }
    }

    /// Registry with the built-in `weight` and `round_robin` balancers.
    pub fn with_defaults(policy: WeightPolicy) -> Self {
        let mut registry = Self::new();
        registry.register_balancer(Arc::new(WeightedBuilder::new(policy)));
        registry.register_balancer(Arc::new(RoundRobinBuilder));
        registry
    }

    /// Every channel dialed on `scheme` shares `store`; closing a channel
    /// does not shut it down for the others.
    pub fn register_store(&mut self, scheme: impl Into<String>, store: Arc<dyn KeyValueStore>) {
        self.stores.insert(scheme.into(), store);
    }

    /// Register a picker builder under its own name, replacing any previous one.
    pub fn register_balancer(&mut self, builder: Arc<dyn PickerBuilder<C>>) {
        self.balancers.insert(builder.name().to_string(), builder);
    }

    pub fn store(&self, scheme: &str) -> Option<Arc<dyn KeyValueStore>> {
        self.stores.get(scheme).cloned()
    }

    pub fn balancer(&self, name: &str) -> Option<Arc<dyn PickerBuilder<C>>> {
        self.balancers.get(name).cloned()
    }

    /// Resolve `target` and balance across it with the named balancer.
    pub async fn dial(
        &self,
        target: &str,
        balancer: &str,
        connector: Arc<dyn Connector<C>>,
        options: ResolverOptions,
    ) -> Result<Channel<C>, DialError> {
        let target = Target::parse(target).ok_or_else(|| DialError::InvalidTarget(target.to_string()))?;
        let store = self
            .store(&target.scheme)
            .ok_or_else(|| DialError::UnknownScheme(target.scheme.clone()))?;
        let builder = self
            .balancer(balancer)
            .ok_or_else(|| DialError::UnknownBalancer(balancer.to_string()))?;

        tracing::info!(target = %target, balancer = %balancer, "Dialing");

        let pool = Arc::new(Balancer::new(builder, connector));
        let listener: Arc<dyn UpdateListener> = pool.clone();
        let (resolver, _initial) = Resolver::build(store, &target.prefix(), listener, options).await?;

        Ok(Channel::new(target, resolver, pool))
    }
}

impl<C: Clone + Send + Sync + 'static> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}
