//! Ports for the attestation subsystem.
//!
//! - [`QuoteVerifier`]: verify a quote and read its typed fields
//! - [`Attestor`]: produce quotes and in-enclave signatures
//! - [`MeasurementPolicy`]: decide whether a measurement may produce blocks
//! - [`KeyCustody`]: attestation-sealed key store exposed to host execution

use crate::domain::{DcapQuote, ReportData};
use crate::error::AttestationResult;
use async_trait::async_trait;
use shared_types::{Address, Hash, HardwareId, Measurement};

/// Verifies quotes and extracts their fields.
///
/// Only `verify_quote` touches the trust chain; the extractors read the
/// fixed v3 offsets and never block.
#[async_trait]
pub trait QuoteVerifier: Send + Sync {
    /// Verify the quote's authenticity.
    async fn verify_quote(&self, quote: &[u8]) -> AttestationResult<()>;

    /// MRENCLAVE of the quoting enclave.
    fn extract_measurement(&self, quote: &[u8]) -> AttestationResult<Measurement> {
        Ok(DcapQuote::parse(quote)?.mr_enclave())
    }

    /// The 64-byte report data.
    fn extract_report_data(&self, quote: &[u8]) -> AttestationResult<[u8; 64]> {
        Ok(DcapQuote::parse(quote)?.report_data())
    }

    /// Producer address committed in `report_data[32..52]`.
    fn extract_producer_id(&self, quote: &[u8]) -> AttestationResult<Address> {
        let raw = self.extract_report_data(quote)?;
        Ok(ReportData::from_bytes(&raw).producer)
    }

    /// Platform identity derived from the attestation key.
    fn extract_hardware_id(&self, quote: &[u8]) -> AttestationResult<HardwareId> {
        Ok(DcapQuote::parse(quote)?.hardware_id())
    }
}

/// Enclave-side capability: quotes and seal signatures.
#[async_trait]
pub trait Attestor: Send + Sync {
    /// Produce a quote committing to `report_data`.
    async fn generate_quote(&self, report_data: &[u8; 64]) -> AttestationResult<Vec<u8>>;

    /// Sign a 32-byte hash with the enclave-held producer key (65 bytes, recoverable).
    async fn sign_in_enclave(&self, hash: &Hash) -> AttestationResult<[u8; 65]>;

    /// Address of the producer key.
    fn producer_id(&self) -> Address;

    /// MRENCLAVE of the running enclave.
    fn measurement(&self) -> Measurement;
}

/// Source of truth for permitted measurements.
pub trait MeasurementPolicy: Send + Sync {
    fn is_allowed(&self, measurement: &Measurement) -> bool;
}

/// Identifier of a custody key.
pub type KeyId = [u8; 32];

/// Attestation-sealed key custody.
///
/// Keys are owned by the address that created them; only the owner may sign.
pub trait KeyCustody: Send + Sync {
    /// Create a fresh secp256k1 key owned by `owner`.
    fn create_key(&self, owner: Address) -> AttestationResult<KeyId>;

    /// Uncompressed SEC1 public key.
    fn public_key(&self, id: &KeyId) -> AttestationResult<Vec<u8>>;

    /// Recoverable signature over `prehash`; `caller` must own the key.
    fn sign(&self, id: &KeyId, caller: Address, prehash: &Hash) -> AttestationResult<[u8; 65]>;

    fn is_owner(&self, id: &KeyId, caller: Address) -> bool;

    /// Remove a key; `caller` must own it.
    fn delete_key(&self, id: &KeyId, caller: Address) -> AttestationResult<()>;

    /// Enclave randomness.
    fn random_bytes(&self, len: usize) -> Vec<u8>;
}
