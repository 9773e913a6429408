//! Delivery server error types

use crypto_envelope::CryptoError;
use secret_protocol::ProtocolError;
use share_session::SessionError;
use thiserror::Error;

use crate::tunnel::TunnelError;

/// Error while starting or running a share
#[derive(Debug, Error)]
pub enum HostError {
    #[error("No data to send")]
    EmptyPayload,

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Bind error: {0}")]
    Bind(std::io::Error),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;
