//! Top-level facade crate for faultbox.
//!
//! Re-exports core types and the server library so users can depend on a single crate.

pub mod core {
    pub use faultbox_core::*;
}

pub mod server {
    pub use faultbox_server::*;
}
