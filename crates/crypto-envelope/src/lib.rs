//! Crypto Envelope - authenticated encryption for send-secret
//!
//! Seals a payload under a one-off ChaCha20Poly1305 key into
//! `nonce ++ tag ++ ciphertext`.
//!
//! The field sizes match AES-256-GCM envelopes, but the cipher does not:
//! envelopes produced by AES-GCM based senders will not open here, and
//! these will not open there.

mod envelope;
mod error;

pub use envelope::*;
pub use error::*;

/// Nonce size for ChaCha20Poly1305 (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Smallest valid envelope: nonce and tag around an empty ciphertext
pub const ENVELOPE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;
