//! Share key material

use zeroize::Zeroizing;

use crate::{KEY_HEX_LEN, KEY_SIZE, ProtocolError, ProtocolResult};

/// 256-bit symmetric key that decrypts one share.
///
/// The key only ever leaves the process inside a URL fragment, so it has no
/// `Display` impl and its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareKey(Zeroizing<[u8; KEY_SIZE]>);

impl ShareKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse a transported key: exactly 64 hex characters, either case
    pub fn from_hex(s: &str) -> ProtocolResult<Self> {
        if s.len() != KEY_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidKeyFormat);
        }

        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        hex::decode_to_slice(s, bytes.as_mut_slice())
            .map_err(|_| ProtocolError::InvalidKeyFormat)?;
        Ok(Self(bytes))
    }

    /// Lowercase hex form, as placed in the URL fragment
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ShareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ShareKey(<redacted>)")
    }
}
