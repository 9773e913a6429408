//! Shared Protocol Definitions for send-secret
//!
//! Identifiers, key material, share links and the small JSON types that
//! travel between the delivery server and the receiver.

mod error;
mod key;
mod link;
mod share;

pub use error::*;
pub use key::*;
pub use link::*;
pub use share::*;

/// Share key size (256 bits / 32 bytes)
pub const KEY_SIZE: usize = 32;

/// Length of a share key once hex encoded
pub const KEY_HEX_LEN: usize = KEY_SIZE * 2;

/// Random bytes behind a share id (128 bits)
pub const SHARE_ID_BYTES: usize = 16;

/// Largest payload a sender may share (100 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Path prefix under which every share is served
pub const SHARE_PATH_PREFIX: &str = "/s/";

/// Name of the fragment parameter carrying the key
pub const KEY_FRAGMENT_PARAM: &str = "key";
