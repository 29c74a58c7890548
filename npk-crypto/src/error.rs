//! Error types for npk-crypto operations.

use thiserror::Error;

/// Errors that can occur during crypto operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key string is not valid hex.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Key has the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },
}
