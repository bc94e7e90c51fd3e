//! Error types for the attestation subsystem.

use shared_types::Measurement;
use thiserror::Error;

/// Attestation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    /// The bytes are not a structurally valid quote.
    #[error("Invalid SGX quote: {0}")]
    InvalidQuote(String),

    /// The quote parsed but failed verification.
    #[error("Quote verification failed: {0}")]
    VerificationFailed(String),

    /// The enclave signer is not trusted.
    #[error("Untrusted enclave signer: {0}")]
    UntrustedSigner(Measurement),

    /// Quote from a debug-mode enclave.
    #[error("Debug enclaves are not accepted")]
    DebugEnclave,

    /// Verification exceeded its deadline.
    #[error("Quote verification timed out after {0} ms")]
    Timeout(u64),

    /// Claimed measurement differs from the quote.
    #[error("Invalid MR: claimed {claimed}, quote carries {actual}")]
    InvalidMeasurement {
        claimed: Measurement,
        actual: Measurement,
    },

    /// Measurement not permitted by the active policy.
    #[error("MR not allowed: {0}")]
    MeasurementNotAllowed(Measurement),

    /// Attestation device I/O failed.
    #[error("Attestation device error: {0}")]
    Io(String),

    /// The attestation backend is not DCAP.
    #[error("Unsupported attestation type: {0}")]
    UnsupportedAttestationType(String),

    /// In-enclave signing failed.
    #[error("Enclave signing failed: {0}")]
    SigningFailed(String),

    /// Custody key does not exist.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Caller does not own the custody key.
    #[error("Permission denied for key {0}")]
    PermissionDenied(String),
}

impl AttestationError {
    /// Snake-case error kind, used for metrics labels and RPC payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuote(_) => "invalid_SGX_quote",
            Self::VerificationFailed(_)
            | Self::UntrustedSigner(_)
            | Self::DebugEnclave
            | Self::Timeout(_) => "quote_verification_failed",
            Self::InvalidMeasurement { .. } => "invalid_MR",
            Self::MeasurementNotAllowed(_) => "MR_not_allowed",
            Self::Io(_) | Self::UnsupportedAttestationType(_) => "attestation_unavailable",
            Self::SigningFailed(_) => "signing_failed",
            Self::KeyNotFound(_) => "key_not_found",
            Self::PermissionDenied(_) => "permission_denied",
        }
    }
}

impl From<std::io::Error> for AttestationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<shared_crypto::CryptoError> for AttestationError {
    fn from(e: shared_crypto::CryptoError) -> Self {
        Self::SigningFailed(e.to_string())
    }
}

/// Result type for attestation operations.
pub type AttestationResult<T> = Result<T, AttestationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AttestationError::InvalidQuote("x".into()).kind(), "invalid_SGX_quote");
        assert_eq!(AttestationError::Timeout(10).kind(), "quote_verification_failed");
        assert_eq!(
            AttestationError::MeasurementNotAllowed(Measurement::default()).kind(),
            "MR_not_allowed"
        );
    }
}
