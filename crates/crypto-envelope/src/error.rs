//! Crypto envelope error types

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: authentication tag mismatch")]
    AuthenticationFailure,

    #[error("Envelope too short: {actual} bytes (min: {min})")]
    EnvelopeTooShort { actual: usize, min: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
