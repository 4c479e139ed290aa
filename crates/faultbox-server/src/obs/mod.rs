//! Application metrics on top of the core registry.
//!
//! Family names and label sets live here so handlers and the request tap
//! never spell metric names inline.

pub mod metrics;
pub mod process;
