//! Metrics collection and exposition.
//!
//! # Metrics
//! - `discovery_snapshots_published_total` (counter): snapshots pushed to listeners
//! - `discovery_endpoints` (gauge): endpoints in the last published snapshot, by prefix
//! - `discovery_feed_interruptions_total` (counter): lost change feeds, by prefix
//! - `discovery_malformed_entries_total` (counter): weights that fell back to the default
//! - `balancer_picks_total` (counter): picks by outcome (`ok`, `no_endpoints`)
//! - `balancer_ready_connections` (gauge): connections in the current picker

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!(
        "discovery_snapshots_published_total",
        "Total endpoint snapshots published to listeners"
    );
    describe_gauge!("discovery_endpoints", "Endpoints in the latest snapshot");
    describe_counter!(
        "discovery_feed_interruptions_total",
        "Total change feed interruptions recovered by re-scanning"
    );
    describe_counter!(
        "discovery_malformed_entries_total",
        "Total stored weights that fell back to the default"
    );
    describe_counter!("balancer_picks_total", "Total picks by outcome");
    describe_gauge!(
        "balancer_ready_connections",
        "Ready connections in the current picker"
    );
}

pub fn record_snapshot(prefix: &str, endpoints: usize) {
    counter!("discovery_snapshots_published_total").increment(1);
    gauge!("discovery_endpoints", "prefix" => prefix.to_string()).set(endpoints as f64);
}

pub fn record_feed_interruption(prefix: &str) {
    counter!("discovery_feed_interruptions_total", "prefix" => prefix.to_string()).increment(1);
}

pub fn record_malformed_entry() {
    counter!("discovery_malformed_entries_total").increment(1);
}

pub fn record_pick(ok: bool) {
    let outcome = if ok { "ok" } else { "no_endpoints" };
    counter!("balancer_picks_total", "outcome" => outcome).increment(1);
}

pub fn record_ready_connections(count: usize) {
    gauge!("balancer_ready_connections").set(count as f64);
}
