//! Delivery Server - HTTP surface for ephemeral shares
//!
//! Serves sealed envelopes under `/s/{id}` and drives the sender side of a
//! share: encrypt, publish, expose through a tunnel, tear down.

mod body;
mod config;
mod error;
mod host;
mod page;
mod routes;
mod server;
pub mod tunnel;

pub use config::*;
pub use error::*;
pub use host::*;
pub use routes::*;
pub use server::*;

/// Default grace period for in-flight responses during shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
