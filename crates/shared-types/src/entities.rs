//! # Core Domain Entities
//!
//! The host-chain view consumed by the consensus core: headers, blocks and
//! transactions, plus the enclave identifiers that governance keys on.
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeader`, `Block`, `Transaction`
//! - **Enclave identity**: `Measurement`, `HardwareId`, `NodeId`

use crate::errors::TypeError;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte keccak hash.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// The all-zero hash.
pub const ZERO_HASH: Hash = [0u8; 32];

/// The all-zero address.
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// One-shot keccak256.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Big-endian bytes of a U256 with leading zeros stripped (RLP integer form).
pub fn u256_to_be_trimmed(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first = buf.iter().position(|b| *b != 0).unwrap_or(32);
    buf[first..].to_vec()
}

// =============================================================================
// ENCLAVE IDENTITY
// =============================================================================

/// A 32-byte enclave measurement (MRENCLAVE or MRSIGNER).
///
/// Compared bytewise; ordering is lexicographic so measurements can key
/// ordered maps deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Measurement(pub [u8; 32]);

impl Measurement {
    /// Build from a slice that must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a hex string (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&raw)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Measurement({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Identifier of a physical SGX platform, derived from its attestation key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct HardwareId(pub [u8; 32]);

impl fmt::Debug for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardwareId({})", &hex::encode(self.0)[..16])
    }
}

/// Unique identifier for a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; 32]);

// =============================================================================
// CHAIN
// =============================================================================

/// A transaction as seen by the consensus core.
///
/// Execution is the host's concern; the core only needs identity, sender,
/// fee parameters and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Keccak of the RLP body (see [`Transaction::compute_hash`]).
    pub hash: Hash,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub data: Vec<u8>,
}

impl Transaction {
    /// Create a transaction and seal its hash.
    pub fn new(
        from: Address,
        to: Option<Address>,
        value: U256,
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        data: Vec<u8>,
    ) -> Self {
        let mut tx = Self {
            hash: ZERO_HASH,
            from,
            to,
            value,
            nonce,
            gas_price,
            gas_limit,
            data,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    fn rlp_body(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(7);
        stream.append(&self.nonce);
        stream.append(&u256_to_be_trimmed(&self.gas_price));
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(&to.as_slice()),
            None => stream.append_empty_data(),
        };
        stream.append(&u256_to_be_trimmed(&self.value));
        stream.append(&self.data);
        stream.append(&self.from.as_slice());
        stream.out().to_vec()
    }

    /// Keccak256 over the canonical RLP body.
    pub fn compute_hash(&self) -> Hash {
        keccak256(&self.rlp_body())
    }

    /// Maximum fee the sender pays: `gas_limit * gas_price`.
    pub fn fee(&self) -> U256 {
        self.gas_price.saturating_mul(U256::from(self.gas_limit))
    }

    /// Encoded size in bytes.
    pub fn encoded_size(&self) -> usize {
        self.rlp_body().len()
    }
}

/// Block header as consumed from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    pub parent_hash: Hash,
    pub coinbase: Address,
    pub number: u64,
    /// Unix seconds.
    pub timestamp: u64,
    /// Always 1 on this chain; kept for host compatibility.
    pub difficulty: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub transactions_root: Hash,
    /// Encoded attestation envelope.
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// Canonical RLP encoding of every header field.
    pub fn rlp_encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        stream.append(&self.parent_hash.as_slice());
        stream.append(&self.coinbase.as_slice());
        stream.append(&self.number);
        stream.append(&self.timestamp);
        stream.append(&self.difficulty);
        stream.append(&self.gas_limit);
        stream.append(&self.gas_used);
        stream.append(&self.transactions_root.as_slice());
        stream.append(&self.extra_data);
        stream.out().to_vec()
    }

    /// Keccak256 of the RLP encoding.
    pub fn hash(&self) -> Hash {
        keccak256(&self.rlp_encode())
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0 && self.parent_hash == ZERO_HASH
    }
}

/// A full block: header, body and (always empty) uncles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    /// Assemble a block, filling in the transactions root.
    pub fn new(mut header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        header.transactions_root = compute_transactions_root(&transactions);
        Self {
            header,
            transactions,
            uncles: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Approximate wire size: header plus every transaction body.
    pub fn size(&self) -> usize {
        self.header.rlp_encode().len()
            + self
                .transactions
                .iter()
                .map(Transaction::encoded_size)
                .sum::<usize>()
    }

    pub fn tx_hashes(&self) -> impl Iterator<Item = &Hash> {
        self.transactions.iter().map(|tx| &tx.hash)
    }

    /// Replace the header, keeping the body.
    pub fn with_seal(&self, header: BlockHeader) -> Self {
        Self {
            header,
            transactions: self.transactions.clone(),
            uncles: self.uncles.clone(),
        }
    }
}

/// Keccak over the concatenated transaction hashes.
pub fn compute_transactions_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return ZERO_HASH;
    }
    let mut hasher = Keccak256::new();
    for tx in transactions {
        hasher.update(tx.hash);
    }
    hasher.finalize().into()
}
