//! Error types for npk package operations.

use thiserror::Error;

/// Result type for npk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// npk error types.
///
/// Every fallible operation returns one of these; there is no shared
/// last-error state.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with a known package signature.
    #[error("not a valid npk package: bad magic {0:?}")]
    FormatMismatch([u8; 4]),

    /// The package predates the oldest version this reader can decode.
    #[error("unsupported package version: {0}")]
    UnsupportedVersion(u32),

    /// The directory layout is inconsistent with the file.
    #[error("corrupt package: {0}")]
    Corrupt(String),

    /// An entity claims data past the directory. The directory decrypted
    /// to garbage, which almost always means the key is wrong.
    #[error("entity offset past directory start: wrong key or corrupt directory")]
    BadKey,

    /// Name lookup miss.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Partial reads only work on plain entities; compressed or encrypted
    /// data cannot be decoded from a sub-range.
    #[error("cannot partially read compressed or encrypted entity: {0}")]
    PartialUnsupported(String),

    /// A partial-read range does not fit inside the entity.
    #[error("range out of bounds: offset {offset} + {len} bytes exceeds entity size {size}")]
    InvalidRange { offset: u64, len: usize, size: u32 },

    /// Decompression failed or produced the wrong number of bytes.
    #[error("decompression failed: {0}")]
    Codec(String),

    /// Caller buffer does not match the entity's original size.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Crypto error from npk-crypto.
    #[error("crypto error: {0}")]
    Crypto(#[from] npk_crypto::CryptoError),
}
