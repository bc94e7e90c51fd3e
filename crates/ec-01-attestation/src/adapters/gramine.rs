//! Gramine pseudo-filesystem attestor.
//!
//! Inside a Gramine SGX enclave, writing 64 bytes to
//! `/dev/attestation/user_report_data` and then reading
//! `/dev/attestation/quote` yields a DCAP quote over that report data.
//! The producer key never leaves enclave memory.

use crate::domain::DcapQuote;
use crate::error::{AttestationError, AttestationResult};
use crate::ports::Attestor;
use async_trait::async_trait;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, Hash, Measurement};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default mount point of the attestation pseudo-filesystem.
pub const DEFAULT_ATTESTATION_ROOT: &str = "/dev/attestation";

const ATTESTATION_TYPE_FILE: &str = "attestation_type";
const USER_REPORT_DATA_FILE: &str = "user_report_data";
const QUOTE_FILE: &str = "quote";

/// Attestor over Gramine's `/dev/attestation` interface.
pub struct GramineAttestor {
    root: PathBuf,
    producer_key: Secp256k1KeyPair,
    measurement: Measurement,
    // write-report-data then read-quote must not interleave
    io_lock: Mutex<()>,
}

impl GramineAttestor {
    /// Open the attestation device rooted at `root`.
    ///
    /// Checks the backend is DCAP and learns the enclave's own MRENCLAVE
    /// from a probe quote.
    pub async fn open(
        root: impl AsRef<Path>,
        producer_key: Secp256k1KeyPair,
    ) -> AttestationResult<Self> {
        let root = root.as_ref().to_path_buf();
        let kind = tokio::fs::read_to_string(root.join(ATTESTATION_TYPE_FILE)).await?;
        let kind = kind.trim();
        if kind != "dcap" {
            return Err(AttestationError::UnsupportedAttestationType(kind.to_string()));
        }

        let io_lock = Mutex::new(());
        let probe = Self::quote_via(&root, &io_lock, &[0u8; 64]).await?;
        let measurement = DcapQuote::parse(&probe)?.mr_enclave();
        info!(
            root = %root.display(),
            mr_enclave = %measurement,
            "[ec-01] Gramine attestor ready"
        );

        Ok(Self {
            root,
            producer_key,
            measurement,
            io_lock,
        })
    }

    /// Open the default device at `/dev/attestation`.
    pub async fn open_default(producer_key: Secp256k1KeyPair) -> AttestationResult<Self> {
        Self::open(DEFAULT_ATTESTATION_ROOT, producer_key).await
    }

    async fn quote_via(
        root: &Path,
        io_lock: &Mutex<()>,
        report_data: &[u8; 64],
    ) -> AttestationResult<Vec<u8>> {
        let _guard = io_lock.lock().await;
        tokio::fs::write(root.join(USER_REPORT_DATA_FILE), report_data).await?;
        let quote = tokio::fs::read(root.join(QUOTE_FILE)).await?;
        if quote.is_empty() {
            return Err(AttestationError::InvalidQuote("empty quote".into()));
        }
        Ok(quote)
    }
}

#[async_trait]
impl Attestor for GramineAttestor {
    async fn generate_quote(&self, report_data: &[u8; 64]) -> AttestationResult<Vec<u8>> {
        let quote = Self::quote_via(&self.root, &self.io_lock, report_data).await?;
        debug!(len = quote.len(), "[ec-01] quote generated");
        Ok(quote)
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
