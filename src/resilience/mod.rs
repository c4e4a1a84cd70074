//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Change feed lost:
//!     → backoff.rs (delay before the next re-scan attempt)
//!     → resolver re-scans the prefix and resubscribes
//! ```
//!
//! # Design Decisions
//! - Recovery is local to the resolver; callers never see feed loss
//! - Jittered backoff keeps many clients from re-scanning in lockstep

pub mod backoff;

pub use backoff::Backoff;
