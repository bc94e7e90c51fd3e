//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature bytes were not 65 bytes long
    #[error("Invalid signature length: expected 65, got {0}")]
    InvalidSignatureLength(usize),

    /// Recovery byte was outside `{0, 1, 27, 28}`
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// r/s did not form a valid signature
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Public key recovery failed
    #[error("Signature recovery failed")]
    RecoveryFailed,

    /// Signature did not verify under the given key
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,
}
