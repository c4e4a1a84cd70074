//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resolver / balancer produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (binary only, optional)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers/recorders is the
//!   binary's job
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
