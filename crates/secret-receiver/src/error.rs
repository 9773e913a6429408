//! Receiver error types

use crypto_envelope::CryptoError;
use secret_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("Missing decryption key in URL")]
    MissingKey,

    #[error("Invalid decryption key format")]
    InvalidKeyFormat,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("This secret has already been viewed")]
    AlreadyRetrieved,

    #[error("Failed to fetch: {0}")]
    FetchFailed(String),

    #[error("Decryption failed: {0}")]
    Authentication(#[from] CryptoError),

    #[error("No place to save received files: {0}")]
    NoOutputLocation(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for ReceiveError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::MissingKey => Self::MissingKey,
            ProtocolError::InvalidKeyFormat => Self::InvalidKeyFormat,
            other => Self::InvalidUrl(other.to_string()),
        }
    }
}

pub type ReceiveResult<T> = Result<T, ReceiveError>;
