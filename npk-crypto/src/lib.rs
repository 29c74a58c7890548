//! Encryption and decryption support for npk packages.
//!
//! This crate provides:
//! - `TeaKey`, the 4-word (128-bit) key every npk package is keyed with
//! - TEA block cipher encryption/decryption over byte buffers
//! - Key parsing from hex strings
//!
//! The npk format applies TEA over whole 8-byte blocks only; a trailing
//! partial block is stored in the clear. Both buffer operations here follow
//! that convention, so they are exact inverses of each other on any input
//! length.

pub mod error;
pub mod tea;

pub use error::CryptoError;
pub use tea::{TeaKey, decrypt_tea, encrypt_tea};

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
