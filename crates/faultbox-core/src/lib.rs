//! faultbox core: transport-agnostic fault injection, metrics, and workload primitives.
//!
//! This crate defines the control surface shared by the HTTP server and its
//! tests: the error-rate controller, the metrics registry with Prometheus text
//! export, and the CPU-burn workload. It carries no HTTP or async runtime
//! dependencies so every piece can be exercised directly.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `FaultboxError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod fault;
pub mod metrics;
pub mod workload;

/// Shared result type.
pub use error::{Result, FaultboxError};
pub use fault::{FaultController, RateSnapshot};
pub use metrics::{MetricKind, Registry};
