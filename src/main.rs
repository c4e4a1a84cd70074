//! Weighted discovery watcher.
//!
//! Resolves a service from the configured store, keeps a weighted picker
//! current, and periodically reports how picks are distributed.
//!
//! ```text
//! store (memory | etcd)
//!     → Resolver (scan + watch prefix)
//!     → Balancer (picker rebuilt per snapshot)
//!     → pick histogram every tick
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use weighted_discovery::config::{load_config, DiscoveryConfig, StoreBackend};
use weighted_discovery::discovery::{Endpoint, KeyValueStore, MemoryStore};
use weighted_discovery::load_balancer::Connector;
use weighted_discovery::observability::{logging, metrics};
use weighted_discovery::Registry;

#[derive(Parser)]
#[command(name = "weighted-discovery")]
#[command(about = "Watch a service prefix and balance picks by weight", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Picks to perform per tick.
    #[arg(short, long, default_value_t = 1000)]
    picks: usize,

    /// Milliseconds between ticks.
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Print snapshots as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DiscoveryConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("weighted-discovery v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = build_store(&config).await?;

    let mut registry = Registry::with_defaults(config.weight_policy());
    registry.register_store(config.target.scheme.clone(), store);

    let connector: Arc<dyn Connector<String>> = Arc::new(|e: &Endpoint| e.identity.clone());
    let channel = registry
        .dial(
            &config.target.uri(),
            &config.target.balancer,
            connector,
            config.resolver_options(),
        )
        .await?;

    tracing::info!(
        target = %channel.target(),
        endpoints = channel.snapshot().len(),
        "Channel ready"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    let mut last_revision = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = channel.snapshot();
                if last_revision != Some(snapshot.revision()) {
                    last_revision = Some(snapshot.revision());
                    if cli.json {
                        println!("{}", serde_json::to_string(&snapshot)?);
                    } else {
                        for endpoint in snapshot.endpoints() {
                            println!("{} weight={}", endpoint.identity, endpoint.weight);
                        }
                    }
                }
                report_picks(&channel, cli.picks);
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    channel.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn build_store(config: &DiscoveryConfig) -> Result<Arc<dyn KeyValueStore>, Box<dyn std::error::Error>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            for entry in &config.store.seed {
                store.put(entry.key.clone(), entry.value.clone());
            }
            tracing::info!(entries = config.store.seed.len(), "Using in-memory store");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "etcd")]
        StoreBackend::Etcd => {
            let store = weighted_discovery::discovery::etcd::EtcdStore::connect(
                &config.store.endpoints,
                Duration::from_secs(config.timeouts.dial_secs),
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "etcd"))]
        StoreBackend::Etcd => Err("etcd backend requires building with --features etcd".into()),
    }
}

fn report_picks(channel: &weighted_discovery::Channel<String>, picks: usize) {
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
    let mut failures = 0;
    for _ in 0..picks {
        match channel.pick() {
            Ok(addr) => *histogram.entry(addr).or_default() += 1,
            Err(_) => failures += 1,
        }
    }

    if failures > 0 {
        tracing::warn!(failures, "Picks failed: no endpoints available");
    }
    for (addr, count) in &histogram {
        tracing::info!(address = %addr, picks = count, "Pick distribution");
    }
}
