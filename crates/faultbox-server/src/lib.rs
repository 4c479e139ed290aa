//! faultbox server library entry.
//!
//! Wires config, shared state, the request tap, and the health, info,
//! metrics and error-simulation handlers into an axum router. It is
//! intended to be consumed by the binary (`main.rs`) and by integration
//! tests, which drive the router in-process.

pub mod app_state;
pub mod config;
pub mod error;
pub mod faults;
pub mod obs;
pub mod ops;
pub mod router;
pub mod tap;
