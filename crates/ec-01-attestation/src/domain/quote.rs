//! DCAP v3 quote layout.
//!
//! ```text
//! 0      48                                   432   436     500        564
//! | hdr  | report body (384)                  | len | sig   | att key  | QE data ...
//!        112 MRENCLAVE 144   176 MRSIGNER 208     368 REPORT_DATA 432
//! ```
//!
//! Only the fixed-offset prefix is interpreted. Signature chains beyond the
//! attestation key are the verifier backend's business.

use crate::error::{AttestationError, AttestationResult};
use shared_types::{keccak256, HardwareId, Measurement};

/// Supported quote version.
pub const QUOTE_VERSION: u16 = 3;
/// ECDSA-256 attestation key type.
pub const ATTESTATION_KEY_TYPE_ECDSA256: u16 = 2;
/// Intel QE vendor id.
pub const INTEL_QE_VENDOR_ID: [u8; 16] = [
    0x93, 0x9a, 0x72, 0x33, 0xf7, 0x9c, 0x4c, 0xa9, 0x94, 0x0a, 0x0d, 0xb3, 0x95, 0x7f, 0x06, 0x07,
];

pub const HEADER_LEN: usize = 48;
pub const ATTRIBUTES_OFFSET: usize = 96;
pub const MR_ENCLAVE_OFFSET: usize = 112;
pub const MR_SIGNER_OFFSET: usize = 176;
pub const ISV_PROD_ID_OFFSET: usize = 304;
pub const ISV_SVN_OFFSET: usize = 306;
pub const REPORT_DATA_OFFSET: usize = 368;
pub const REPORT_DATA_LEN: usize = 64;
/// Header + report body: the bytes covered by the quote signature.
pub const SIGNED_LEN: usize = 432;
pub const SIG_DATA_LEN_OFFSET: usize = 432;
pub const QUOTE_SIGNATURE_OFFSET: usize = 436;
pub const ATTESTATION_KEY_OFFSET: usize = 500;
pub const ATTESTATION_KEY_LEN: usize = 64;
/// Shortest quote carrying an attestation key.
pub const MIN_QUOTE_LEN: usize = ATTESTATION_KEY_OFFSET + ATTESTATION_KEY_LEN;

/// SGX attribute flag for debug enclaves.
const ATTRIBUTE_DEBUG: u8 = 0x02;

fn read32(raw: &[u8], offset: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&raw[offset..offset + 32]);
    out
}

fn read_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

/// Borrowed view over a length-checked DCAP v3 quote.
#[derive(Debug, Clone, Copy)]
pub struct DcapQuote<'a> {
    raw: &'a [u8],
}

impl<'a> DcapQuote<'a> {
    /// Check length and version; every accessor is infallible afterwards.
    pub fn parse(raw: &'a [u8]) -> AttestationResult<Self> {
        if raw.len() < MIN_QUOTE_LEN {
            return Err(AttestationError::InvalidQuote(format!(
                "quote too short: {} < {}",
                raw.len(),
                MIN_QUOTE_LEN
            )));
        }
        let version = read_u16(raw, 0);
        if version != QUOTE_VERSION {
            return Err(AttestationError::InvalidQuote(format!(
                "unsupported quote version {version}"
            )));
        }
        Ok(Self { raw })
    }

    pub fn version(&self) -> u16 {
        read_u16(self.raw, 0)
    }

    pub fn attestation_key_type(&self) -> u16 {
        read_u16(self.raw, 2)
    }

    pub fn mr_enclave(&self) -> Measurement {
        Measurement(read32(self.raw, MR_ENCLAVE_OFFSET))
    }

    pub fn mr_signer(&self) -> Measurement {
        Measurement(read32(self.raw, MR_SIGNER_OFFSET))
    }

    pub fn isv_prod_id(&self) -> u16 {
        read_u16(self.raw, ISV_PROD_ID_OFFSET)
    }

    pub fn isv_svn(&self) -> u16 {
        read_u16(self.raw, ISV_SVN_OFFSET)
    }

    pub fn is_debug(&self) -> bool {
        self.raw[ATTRIBUTES_OFFSET] & ATTRIBUTE_DEBUG != 0
    }

    pub fn report_data(&self) -> [u8; REPORT_DATA_LEN] {
        let mut out = [0u8; REPORT_DATA_LEN];
        out.copy_from_slice(&self.raw[REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + REPORT_DATA_LEN]);
        out
    }

    /// Bytes covered by the quote signature.
    pub fn signed_region(&self) -> &'a [u8] {
        &self.raw[..SIGNED_LEN]
    }

    pub fn quote_signature(&self) -> &'a [u8] {
        &self.raw[QUOTE_SIGNATURE_OFFSET..ATTESTATION_KEY_OFFSET]
    }

    pub fn attestation_key(&self) -> [u8; ATTESTATION_KEY_LEN] {
        let mut out = [0u8; ATTESTATION_KEY_LEN];
        out.copy_from_slice(
            &self.raw[ATTESTATION_KEY_OFFSET..ATTESTATION_KEY_OFFSET + ATTESTATION_KEY_LEN],
        );
        out
    }

    /// Platform identity: keccak of the attestation key.
    pub fn hardware_id(&self) -> HardwareId {
        HardwareId(keccak256(&self.attestation_key()))
    }
}

/// Assembles quote bytes in the v3 layout.
///
/// The signature and attestation key are left zero until [`QuoteBuilder::finish`].
#[derive(Debug, Clone)]
pub struct QuoteBuilder {
    raw: Vec<u8>,
}

impl QuoteBuilder {
    pub fn new(mr_enclave: Measurement, mr_signer: Measurement) -> Self {
        let mut raw = vec![0u8; MIN_QUOTE_LEN];
        raw[0..2].copy_from_slice(&QUOTE_VERSION.to_le_bytes());
        raw[2..4].copy_from_slice(&ATTESTATION_KEY_TYPE_ECDSA256.to_le_bytes());
        raw[12..28].copy_from_slice(&INTEL_QE_VENDOR_ID);
        raw[MR_ENCLAVE_OFFSET..MR_ENCLAVE_OFFSET + 32].copy_from_slice(mr_enclave.as_bytes());
        raw[MR_SIGNER_OFFSET..MR_SIGNER_OFFSET + 32].copy_from_slice(mr_signer.as_bytes());
        let sig_len = (MIN_QUOTE_LEN - QUOTE_SIGNATURE_OFFSET) as u32;
        raw[SIG_DATA_LEN_OFFSET..QUOTE_SIGNATURE_OFFSET].copy_from_slice(&sig_len.to_le_bytes());
        Self { raw }
    }

    pub fn report_data(mut self, report_data: &[u8; REPORT_DATA_LEN]) -> Self {
        self.raw[REPORT_DATA_OFFSET..SIGNED_LEN].copy_from_slice(report_data);
        self
    }

    pub fn isv(mut self, prod_id: u16, svn: u16) -> Self {
        self.raw[ISV_PROD_ID_OFFSET..ISV_PROD_ID_OFFSET + 2].copy_from_slice(&prod_id.to_le_bytes());
        self.raw[ISV_SVN_OFFSET..ISV_SVN_OFFSET + 2].copy_from_slice(&svn.to_le_bytes());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        if debug {
            self.raw[ATTRIBUTES_OFFSET] |= ATTRIBUTE_DEBUG;
        } else {
            self.raw[ATTRIBUTES_OFFSET] &= !ATTRIBUTE_DEBUG;
        }
        self
    }

    /// Keccak of the signed region, for the attestation key to sign.
    pub fn signing_digest(&self) -> [u8; 32] {
        keccak256(&self.raw[..SIGNED_LEN])
    }

    /// Attach the quote signature and attestation key.
    pub fn finish(mut self, signature: &[u8; 64], attestation_key: &[u8; 64]) -> Vec<u8> {
        self.raw[QUOTE_SIGNATURE_OFFSET..ATTESTATION_KEY_OFFSET].copy_from_slice(signature);
        self.raw[ATTESTATION_KEY_OFFSET..MIN_QUOTE_LEN].copy_from_slice(attestation_key);
        self.raw
    }
}
