//! Header extra-data envelope.
//!
//! ```text
//! extra = RLP([ quote, producer_id(20), attestation_ts, signature(0 | 65) ])
//! ```
//!
//! RLP is canonical: integers carry no leading zeros and lengths use the
//! shortest form, so equal envelopes always encode to equal bytes. The seal
//! hash is taken over the header with an empty signature.

use crate::error::{ConsensusError, ConsensusResult};
use rlp::{Rlp, RlpStream};
use shared_types::{Address, BlockHeader, Hash};

/// Lower bound on encoded extra-data.
pub const MIN_EXTRA_LEN: usize = 32;
/// Upper bound on encoded extra-data.
pub const MAX_EXTRA_LEN: usize = 10_240;
/// Recoverable secp256k1 signature length.
pub const SIGNATURE_LEN: usize = 65;

/// Per-header attestation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtraData {
    pub quote: Vec<u8>,
    pub producer_id: Address,
    /// Unix seconds.
    pub attestation_ts: u64,
    /// Empty while unsealed.
    pub signature: Vec<u8>,
}

impl ExtraData {
    pub fn new(quote: Vec<u8>, producer_id: Address, attestation_ts: u64) -> Self {
        Self {
            quote,
            producer_id,
            attestation_ts,
            signature: Vec::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        !self.signature.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(4);
        stream.append(&self.quote);
        stream.append(&self.producer_id.as_slice());
        stream.append(&self.attestation_ts);
        stream.append(&self.signature);
        stream.out().to_vec()
    }

    /// Strict decode: exactly one four-item list, no trailing bytes.
    pub fn decode(data: &[u8]) -> ConsensusResult<Self> {
        let rlp = Rlp::new(data);
        if !rlp.is_list() {
            return Err(ConsensusError::InvalidExtra("extra is not a list".into()));
        }
        let info = rlp.payload_info()?;
        if info.header_len + info.value_len != data.len() {
            return Err(ConsensusError::InvalidExtra("trailing bytes after extra".into()));
        }
        if rlp.item_count()? != 4 {
            return Err(ConsensusError::InvalidExtra("extra must have four fields".into()));
        }

        let quote: Vec<u8> = rlp.val_at(0)?;
        if quote.is_empty() {
            return Err(ConsensusError::InvalidExtra("empty quote".into()));
        }
        let producer_raw = rlp.at(1)?.data()?;
        let producer_id: Address = producer_raw
            .try_into()
            .map_err(|_| ConsensusError::InvalidExtra("producer_id must be 20 bytes".into()))?;
        let attestation_ts: u64 = rlp.val_at(2)?;
        let signature: Vec<u8> = rlp.val_at(3)?;
        if !signature.is_empty() && signature.len() != SIGNATURE_LEN {
            return Err(ConsensusError::InvalidExtra(format!(
                "signature must be empty or {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            )));
        }
        Ok(Self {
            quote,
            producer_id,
            attestation_ts,
            signature,
        })
    }

    /// The envelope with its signature cleared.
    pub fn unsigned(&self) -> Self {
        Self {
            signature: Vec::new(),
            ..self.clone()
        }
    }
}

/// Length check then decode.
pub fn decode_header_extra(header: &BlockHeader) -> ConsensusResult<ExtraData> {
    let len = header.extra_data.len();
    if !(MIN_EXTRA_LEN..=MAX_EXTRA_LEN).contains(&len) {
        return Err(ConsensusError::InvalidExtra(format!(
            "extra length {len} outside [{MIN_EXTRA_LEN}, {MAX_EXTRA_LEN}]"
        )));
    }
    ExtraData::decode(&header.extra_data)
}

/// Hash of the header with an empty signature in its extra. This is what
/// producers sign.
pub fn seal_hash(header: &BlockHeader) -> ConsensusResult<Hash> {
    let extra = ExtraData::decode(&header.extra_data)?;
    let mut unsigned = header.clone();
    unsigned.extra_data = extra.unsigned().encode();
    Ok(unsigned.hash())
}
