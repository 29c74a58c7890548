//! TEA (Tiny Encryption Algorithm) implementation for npk packages.
//!
//! npk encrypts entity directories and entity payloads with TEA under a
//! single package-wide 128-bit key. The cipher runs over consecutive
//! 8-byte blocks; any trailing bytes that do not fill a block are left
//! untouched, which is the convention the on-disk format was written with.

use tracing::trace;

use crate::{CryptoError, Result};

const DELTA: u32 = 0x9E37_79B9;
const ROUNDS: usize = 32;

/// A 4-word TEA key.
///
/// Every supported npk package version requires the caller to supply the
/// key; it is never stored in the package itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeaKey([u32; 4]);

impl TeaKey {
    /// Build a key from its four 32-bit words.
    pub fn new(words: [u32; 4]) -> Self {
        Self(words)
    }

    /// Parse a key from a 32-character hex string (16 bytes, big-endian
    /// word order).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        if bytes.len() != 16 {
            return Err(CryptoError::InvalidKeySize {
                expected: 16,
                actual: bytes.len(),
            });
        }
        let mut words = [0u32; 4];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            words[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self(words))
    }

    /// The key as its four words.
    pub fn words(&self) -> &[u32; 4] {
        &self.0
    }
}

fn encrypt_block(mut v0: u32, mut v1: u32, k: &[u32; 4]) -> (u32, u32) {
    let mut sum: u32 = 0;
    for _ in 0..ROUNDS {
        sum = sum.wrapping_add(DELTA);
        v0 = v0.wrapping_add(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        v1 = v1.wrapping_add(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
    }
    (v0, v1)
}

fn decrypt_block(mut v0: u32, mut v1: u32, k: &[u32; 4]) -> (u32, u32) {
    let mut sum: u32 = DELTA.wrapping_mul(ROUNDS as u32);
    for _ in 0..ROUNDS {
        v1 = v1.wrapping_sub(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
        v0 = v0.wrapping_sub(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        sum = sum.wrapping_sub(DELTA);
    }
    (v0, v1)
}

/// Encrypt a buffer in place.
///
/// Whole 8-byte blocks are encrypted; a trailing partial block is left as
/// plaintext. Primarily useful for building packages and tests.
pub fn encrypt_tea(data: &mut [u8], key: &TeaKey) {
    trace!("TEA encrypt: {} bytes", data.len());
    for block in data.chunks_exact_mut(8) {
        let v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let (v0, v1) = encrypt_block(v0, v1, &key.0);
        block[..4].copy_from_slice(&v0.to_le_bytes());
        block[4..].copy_from_slice(&v1.to_le_bytes());
    }
}

/// Decrypt a buffer in place.
///
/// Exact inverse of [`encrypt_tea`]: whole 8-byte blocks are decrypted,
/// trailing bytes pass through unchanged.
pub fn decrypt_tea(data: &mut [u8], key: &TeaKey) {
    trace!("TEA decrypt: {} bytes", data.len());
    for block in data.chunks_exact_mut(8) {
        let v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let (v0, v1) = decrypt_block(v0, v1, &key.0);
        block[..4].copy_from_slice(&v0.to_le_bytes());
        block[4..].copy_from_slice(&v1.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> TeaKey {
        TeaKey::new([0x01234567, 0x89ABCDEF, 0xFEDCBA98, 0x76543210])
    }

    #[test]
    fn test_tea_roundtrip() {
        let original = b"The quick brown fox jumps over the lazy dog.....".to_vec();
        assert_eq!(original.len() % 8, 0);

        let mut data = original.clone();
        encrypt_tea(&mut data, &test_key());
        assert_ne!(data, original);

        decrypt_tea(&mut data, &test_key());
        assert_eq!(data, original);
    }

    #[test]
    fn test_tea_partial_tail_passes_through() {
        // 11 bytes: one full block plus a 3-byte tail.
        let original = b"hello world".to_vec();
        let mut data = original.clone();

        encrypt_tea(&mut data, &test_key());
        assert_eq!(&data[8..], &original[8..]);
        assert_ne!(&data[..8], &original[..8]);

        decrypt_tea(&mut data, &test_key());
        assert_eq!(data, original);
    }

    #[test]
    fn test_tea_short_buffer_unchanged() {
        let original = b"1234567".to_vec();
        let mut data = original.clone();
        encrypt_tea(&mut data, &test_key());
        assert_eq!(data, original);
    }

    #[test]
    fn test_tea_key_sensitivity() {
        let original = vec![0xA5u8; 64];
        let mut a = original.clone();
        let mut b = original.clone();

        encrypt_tea(&mut a, &test_key());
        encrypt_tea(&mut b, &TeaKey::new([1, 2, 3, 4]));
        assert_ne!(a, b);

        // Decrypting with the wrong key must not recover the plaintext.
        decrypt_tea(&mut a, &TeaKey::new([1, 2, 3, 4]));
        assert_ne!(a, original);
    }

    #[test]
    fn test_key_from_hex() {
        let key = TeaKey::from_hex("0123456789abcdeffedcba9876543210").unwrap();
        assert_eq!(
            key.words(),
            &[0x01234567, 0x89ABCDEF, 0xFEDCBA98, 0x76543210]
        );
    }

    #[test]
    fn test_key_from_hex_rejects_bad_input() {
        assert!(matches!(
            TeaKey::from_hex("not hex at all"),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            TeaKey::from_hex("0123456789abcdef"),
            Err(CryptoError::InvalidKeySize {
                expected: 16,
                actual: 8
            })
        ));
    }
}
