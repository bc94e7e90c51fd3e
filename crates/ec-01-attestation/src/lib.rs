//! # ec-01-attestation
//!
//! Attestation capability for Enclave-Chain.
//!
//! ## Architecture
//!
//! Every block carries an SGX quote. This crate owns the quote layout and
//! the capabilities the consensus and governance crates consume:
//!
//! ```text
//!   Attestor ──quote(report_data)──→ header extra ──→ QuoteVerifier
//!       │                                               │
//!   sign_in_enclave(seal_hash)               measurement / report data
//!                                                       │
//!                                              MeasurementPolicy
//! ```
//!
//! ## Report data
//!
//! `[0..32]` binds the quote to a block (the parent hash), `[32..52]` names
//! the producer address that signs the seal.
//!
//! ## Backends
//!
//! - [`GramineAttestor`]: `/dev/attestation` pseudo-filesystem inside SGX
//! - [`SoftwareAttestor`] / [`SoftwareQuoteVerifier`]: in-memory keys for
//!   development networks and tests

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{
    GramineAttestor, InMemoryKeyCustody, SoftwareAttestor, SoftwareQuoteVerifier,
    StaticMeasurementPolicy,
};
pub use domain::{DcapQuote, QuoteBuilder, ReportData};
pub use error::{AttestationError, AttestationResult};
pub use ports::{Attestor, KeyCustody, KeyId, MeasurementPolicy, QuoteVerifier};
pub use service::{ensure_allowed, verify_and_extract, verify_with_timeout, VerifiedQuote};
