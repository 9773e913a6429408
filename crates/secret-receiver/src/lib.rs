//! Secret Receiver - client side of a share
//!
//! Reads the key from the link fragment, fetches metadata and the sealed
//! envelope, decrypts locally and decides where the plaintext goes.

mod client;
mod error;
mod output;

pub use client::*;
pub use error::*;
pub use output::*;

/// Directory under the home directory that collects received files
pub const RECEIVED_SUBDIR: &str = ".send-secret/received";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
