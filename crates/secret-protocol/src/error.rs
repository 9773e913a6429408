//! Error types for the protocol

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Missing decryption key in URL")]
    MissingKey,

    #[error("Invalid decryption key format")]
    InvalidKeyFormat,

    #[error("Invalid share id")]
    InvalidShareId,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
