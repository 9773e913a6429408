//! Envelope sealing and opening with ChaCha20Poly1305

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use rand::RngCore;
use rand::rngs::OsRng;
use secret_protocol::{KEY_SIZE, ShareKey};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, ENVELOPE_OVERHEAD, NONCE_SIZE, TAG_SIZE};

/// Generate a fresh 256-bit share key from the OS RNG
pub fn generate_key() -> ShareKey {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    ShareKey::from_bytes(*bytes)
}

/// Borrowed view of a serialized envelope
///
/// Layout: [12-byte nonce][16-byte auth tag][ciphertext]
#[derive(Debug, Clone, Copy)]
pub struct SecretEnvelope<'a> {
    nonce: &'a [u8],
    tag: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> SecretEnvelope<'a> {
    /// Split a serialized envelope into its three regions
    pub fn parse(bytes: &'a [u8]) -> CryptoResult<Self> {
        if bytes.len() < ENVELOPE_OVERHEAD {
            return Err(CryptoError::EnvelopeTooShort {
                actual: bytes.len(),
                min: ENVELOPE_OVERHEAD,
            });
        }

        let (nonce, rest) = bytes.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);
        Ok(Self {
            nonce,
            tag,
            ciphertext,
        })
    }

    pub fn nonce(&self) -> &'a [u8] {
        self.nonce
    }

    pub fn tag(&self) -> &'a [u8] {
        self.tag
    }

    pub fn ciphertext(&self) -> &'a [u8] {
        self.ciphertext
    }

    /// Serialized length
    pub fn len(&self) -> usize {
        ENVELOPE_OVERHEAD + self.ciphertext.len()
    }

    /// True when the envelope wraps an empty plaintext
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.nonce);
        out.extend_from_slice(self.tag);
        out.extend_from_slice(self.ciphertext);
        out
    }

    /// Verify the tag and decrypt
    pub fn open(&self, key: &ShareKey) -> CryptoResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

        let mut buffer = self.ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(self.nonce),
                b"",
                &mut buffer,
                Tag::from_slice(self.tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailure)?;

        Ok(buffer)
    }
}

/// Encrypt `plaintext` under `key` with a freshly sampled nonce.
///
/// Returns: [nonce][auth tag][ciphertext]
pub fn encrypt(plaintext: &[u8], key: &ShareKey) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut out = Vec::with_capacity(ENVELOPE_OVERHEAD + plaintext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&[0u8; TAG_SIZE]);
    out.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            b"",
            &mut out[ENVELOPE_OVERHEAD..],
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    out[NONCE_SIZE..ENVELOPE_OVERHEAD].copy_from_slice(tag.as_slice());

    Ok(out)
}

/// Decrypt a serialized envelope, failing closed on any tampering
pub fn decrypt(envelope: &[u8], key: &ShareKey) -> CryptoResult<Vec<u8>> {
    SecretEnvelope::parse(envelope)?.open(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        for plaintext in [
            Vec::new(),
            b"hello world".to_vec(),
            vec![0x42u8; 4 * 1024 * 1024 + 7],
        ] {
            let sealed = encrypt(&plaintext, &key).unwrap();
            assert_eq!(sealed.len(), plaintext.len() + ENVELOPE_OVERHEAD);
            assert_eq!(decrypt(&sealed, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonce_freshness() {
        let key = generate_key();
        let a = encrypt(b"same message", &key).unwrap();
        let b = encrypt(b"same message", &key).unwrap();

        assert_ne!(a, b);
        assert_ne!(&a[..NONCE_SIZE], &b[..NONCE_SIZE]);
        assert_eq!(decrypt(&a, &key).unwrap(), b"same message");
        assert_eq!(decrypt(&b, &key).unwrap(), b"same message");
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(b"secret", &generate_key()).unwrap();
        assert_eq!(
            decrypt(&sealed, &generate_key()),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        let key = generate_key();
        let sealed = encrypt(b"tamper me", &key).unwrap();

        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    decrypt(&tampered, &key),
                    Err(CryptoError::AuthenticationFailure),
                    "flip at byte {} bit {} went unnoticed",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_short_envelope_rejected() {
        let key = generate_key();
        for len in [0, 1, ENVELOPE_OVERHEAD - 1] {
            assert_eq!(
                decrypt(&vec![0u8; len], &key),
                Err(CryptoError::EnvelopeTooShort {
                    actual: len,
                    min: ENVELOPE_OVERHEAD
                })
            );
        }
    }

    #[test]
    fn test_envelope_layout() {
        let key = generate_key();
        let sealed = encrypt(b"abc", &key).unwrap();
        let envelope = SecretEnvelope::parse(&sealed).unwrap();

        assert_eq!(envelope.nonce().len(), NONCE_SIZE);
        assert_eq!(envelope.tag().len(), TAG_SIZE);
        assert_eq!(envelope.ciphertext().len(), 3);
        assert_eq!(envelope.len(), sealed.len());
        assert_eq!(envelope.to_bytes(), sealed);
        assert_eq!(envelope.open(&key).unwrap(), b"abc");
    }

    #[test]
    fn test_envelope_is_plain_chacha20poly1305() {
        use chacha20poly1305::aead::Aead;

        let key = generate_key();
        let sealed = encrypt(b"interop", &key).unwrap();
        let envelope = SecretEnvelope::parse(&sealed).unwrap();

        // detached layout back to the combined ciphertext ++ tag form
        let mut combined = envelope.ciphertext().to_vec();
        combined.extend_from_slice(envelope.tag());

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let opened = cipher
            .decrypt(Nonce::from_slice(envelope.nonce()), combined.as_slice())
            .unwrap();
        assert_eq!(opened, b"interop");
    }
}
