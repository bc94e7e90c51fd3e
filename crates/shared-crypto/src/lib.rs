//! # Shared Crypto - Chain Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Header/seal hashes, address derivation |
//! | `ecdsa` | secp256k1 (recoverable) | Block seals, governance votes |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2)
//! - **Signatures**: 65 bytes `r || s || v`, `v ∈ {27, 28}` (also accepts `{0, 1}`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{recover_address, Secp256k1KeyPair, Secp256k1PublicKey, RecoverableSignature};
pub use errors::CryptoError;
pub use hashing::{keccak256, Keccak256Hasher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
