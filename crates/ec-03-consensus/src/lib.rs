//! # ec-03-consensus
//!
//! Attested proof-of-authority consensus engine for Enclave-Chain.
//!
//! Every header carries an RLP attestation envelope in its extra data:
//!
//! ```text
//! extra = rlp([quote, producer_id, attestation_ts, signature])
//! quote.report_data[0..32]  = parent_hash
//! quote.report_data[32..52] = producer_id
//! signature = secp256k1_sign(seal_hash(header))   // 65 bytes, r || s || v
//! ```
//!
//! A header is valid when the quote verifies, its measurement is on the
//! governance whitelist, and the seal recovers to the producer the quote
//! names. Difficulty is always 1; fork choice prefers more transactions, then
//! the earlier timestamp, then the smaller hash.
//!
//! ## Layout
//!
//! - [`domain`]: pure scoring and bookkeeping (quality, candidates, uptime,
//!   reputation, penalties, rewards, scheduling, fork choice)
//! - [`ports`]: host collaborators (chain, state, mempool, gossip, clock)
//! - [`adapters`]: in-process implementations of those ports
//! - [`service`]: the engine, header verifier, reorg handler, production
//!   loop and RPC surface

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use config::{
    BasicConfig, CandidateConfig, ConsensusConfig, OnDemandConfig, PenaltyConfig, QualityConfig,
    ReputationConfig, RewardConfig, UptimeConfig,
};
pub use domain::*;
pub use error::{ConsensusError, ConsensusResult};
pub use ports::{
    BalanceChangeReason, Broadcaster, ChainReader, Mempool, NetworkStats, StateMutator,
    SystemTimeSource, TimeSource, WorkTrigger, WriteGate,
};
pub use service::*;
