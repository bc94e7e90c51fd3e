//! Software attestation for development networks and tests.
//!
//! Quotes use the DCAP v3 layout, but the attestation key is a secp256k1 key
//! held in process memory and the quote signature is checked directly
//! instead of through Intel's PCK chain. Nothing here is hardware-backed.

use crate::domain::{DcapQuote, QuoteBuilder, ATTESTATION_KEY_TYPE_ECDSA256};
use crate::error::{AttestationError, AttestationResult};
use crate::ports::{Attestor, QuoteVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::{keccak256, Secp256k1KeyPair, Secp256k1PublicKey};
use shared_types::{Address, Hash, Measurement};
use std::collections::HashSet;
use tracing::debug;

/// Attestor backed by in-memory keys.
pub struct SoftwareAttestor {
    measurement: Measurement,
    mr_signer: Measurement,
    producer_key: Secp256k1KeyPair,
    platform_key: Secp256k1KeyPair,
    debug: bool,
}

impl SoftwareAttestor {
    pub fn new(
        measurement: Measurement,
        mr_signer: Measurement,
        producer_key: Secp256k1KeyPair,
        platform_key: Secp256k1KeyPair,
    ) -> Self {
        Self {
            measurement,
            mr_signer,
            producer_key,
            platform_key,
            debug: false,
        }
    }

    /// Fresh random producer and platform keys.
    pub fn random(measurement: Measurement) -> Self {
        Self::new(
            measurement,
            Measurement::default(),
            Secp256k1KeyPair::generate(),
            Secp256k1KeyPair::generate(),
        )
    }

    /// Mark produced quotes as coming from a debug enclave.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Raw platform attestation key, as embedded in quotes.
    pub fn platform_key(&self) -> [u8; 64] {
        self.platform_key.public_key().to_raw_xy()
    }

    /// Build and sign a quote synchronously.
    pub fn build_quote(&self, report_data: &[u8; 64]) -> AttestationResult<Vec<u8>> {
        let builder = QuoteBuilder::new(self.measurement, self.mr_signer)
            .report_data(report_data)
            .debug(self.debug);
        let signature = self.platform_key.sign_prehash(&builder.signing_digest())?;
        Ok(builder.finish(&signature, &self.platform_key()))
    }
}

#[async_trait]
impl Attestor for SoftwareAttestor {
    async fn generate_quote(&self, report_data: &[u8; 64]) -> AttestationResult<Vec<u8>> {
        self.build_quote(report_data)
    }

    async fn sign_in_enclave(&self, hash: &Hash) -> AttestationResult<[u8; 65]> {
        Ok(*self.producer_key.sign_recoverable(hash)?.as_bytes())
    }

    fn producer_id(&self) -> Address {
        self.producer_key.address()
    }

    fn measurement(&self) -> Measurement {
        self.measurement
    }
}

/// Verifier for software quotes.
///
/// An empty trusted-signer set accepts any MRSIGNER.
pub struct SoftwareQuoteVerifier {
    trusted_signers: RwLock<HashSet<Measurement>>,
    allow_debug: bool,
}

impl Default for SoftwareQuoteVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareQuoteVerifier {
    pub fn new() -> Self {
        Self {
            trusted_signers: RwLock::new(HashSet::new()),
            allow_debug: false,
        }
    }

    pub fn allow_debug(mut self, allow: bool) -> Self {
        self.allow_debug = allow;
        self
    }

    pub fn add_trusted_signer(&self, signer: Measurement) {
        self.trusted_signers.write().insert(signer);
    }

    pub fn remove_trusted_signer(&self, signer: &Measurement) -> bool {
        self.trusted_signers.write().remove(signer)
    }

    pub fn trusted_signers(&self) -> Vec<Measurement> {
        self.trusted_signers.read().iter().copied().collect()
    }

    fn check(&self, quote: &DcapQuote<'_>) -> AttestationResult<()> {
        if quote.attestation_key_type() != ATTESTATION_KEY_TYPE_ECDSA256 {
            return Err(AttestationError::VerificationFailed(format!(
                "unsupported attestation key type {}",
                quote.attestation_key_type()
            )));
        }
        if quote.is_debug() && !self.allow_debug {
            return Err(AttestationError::DebugEnclave);
        }
        {
            let signers = self.trusted_signers.read();
            if !signers.is_empty() && !signers.contains(&quote.mr_signer()) {
                return Err(AttestationError::UntrustedSigner(quote.mr_signer()));
            }
        }
        let key = Secp256k1PublicKey::from_raw_xy(&quote.attestation_key())
            .map_err(|e| AttestationError::VerificationFailed(e.to_string()))?;
        key.verify_prehash(&keccak256(quote.signed_region()), quote.quote_signature())
            .map_err(|e| AttestationError::VerificationFailed(e.to_string()))
    }
}

#[async_trait]
impl QuoteVerifier for SoftwareQuoteVerifier {
    async fn verify_quote(&self, quote: &[u8]) -> AttestationResult<()> {
        let parsed = DcapQuote::parse(quote)?;
        let result = self.check(&parsed);
        debug!(
            mr_enclave = %parsed.mr_enclave(),
            ok = result.is_ok(),
            "[ec-01] software quote verified"
        );
        result
    }
}
