//! Share identifiers, lifecycle states and wire types

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ProtocolResult, SHARE_ID_BYTES};

/// Encoded length of a share id (16 bytes, unpadded base64url)
const SHARE_ID_LEN: usize = 22;

/// Opaque, unguessable share identifier used in the public path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(String);

impl ShareId {
    /// Fresh id with 128 bits of OS randomness
    pub fn generate() -> Self {
        let mut bytes = [0u8; SHARE_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parse an id taken from a request path
    pub fn parse(s: &str) -> ProtocolResult<Self> {
        let well_formed = s.len() == SHARE_ID_LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !well_formed {
            return Err(ProtocolError::InvalidShareId);
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Share lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareState {
    /// Views remain and the deadline (if any) has not passed
    Active,
    /// Every allowed view was consumed
    Exhausted,
    /// The deadline passed before the views ran out
    Expired,
    /// The sender aborted the share
    Cancelled,
}

impl ShareState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ShareState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Exhausted => "exhausted",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Body of `GET /s/{id}/meta`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMeta {
    pub filename: Option<String>,
}

/// View counter snapshot returned by each successful retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    /// Views consumed including this one
    pub current: u32,
    /// View budget of the share
    pub max: u32,
    /// This view exhausted the share
    pub done: bool,
}

/// One successful retrieval, kept for notifications only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
    /// 1-based view number
    pub ordinal: u32,
    /// Best-known address of the receiver
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_parse() {
        let a = ShareId::generate();
        let b = ShareId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), SHARE_ID_LEN);
        assert_eq!(ShareId::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn test_parse_rejects_foreign_ids() {
        assert!(ShareId::parse("wrongid").is_err());
        assert!(ShareId::parse("").is_err());
        assert!(ShareId::parse("../../etc/passwd/xxxxxxx").is_err());
        assert!(ShareId::parse("aaaaaaaaaaaaaaaaaaaaa=").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ShareState::Active.is_terminal());
        assert!(ShareState::Exhausted.is_terminal());
        assert!(ShareState::Expired.is_terminal());
        assert!(ShareState::Cancelled.is_terminal());
    }

    #[test]
    fn test_meta_json_shape() {
        let text = serde_json::to_string(&ShareMeta::default()).unwrap();
        assert_eq!(text, r#"{"filename":null}"#);

        let meta: ShareMeta = serde_json::from_str(r#"{"filename":"a.txt"}"#).unwrap();
        assert_eq!(meta.filename.as_deref(), Some("a.txt"));
    }
}
