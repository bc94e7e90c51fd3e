//! # Shared Types Crate
//!
//! Host-facing entities shared by every Enclave-Chain crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: headers, blocks, transactions and enclave
//!   identifiers are defined once here.
//! - **Canonical hashing**: header and transaction hashes are keccak256 over
//!   RLP, so two logically equal values always hash identically.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
