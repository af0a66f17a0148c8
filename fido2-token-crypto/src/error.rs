//! Error types for cryptographic operations

use thiserror::Error;

/// Failures raised by key agreement and the symmetric protocol operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The peer public key is not a valid P-256 point
    #[error("invalid public key")]
    InvalidPublicKey,

    /// A key or coordinate had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Plaintext was not aligned to the cipher block size
    #[error("encryption failed")]
    EncryptionFailed,

    /// Ciphertext was malformed or misaligned
    #[error("decryption failed")]
    DecryptionFailed,

    /// MAC verification failed; the payload must not be trusted
    #[error("message authentication failed")]
    AuthenticationFailed,
}

/// Result type alias for cryptographic operations
pub type Result<T> = core::result::Result<T, CryptoError>;
