//! Error types for the consensus subsystem.

use ec_01_attestation::AttestationError;
use ec_02_governance::GovernanceError;
use shared_types::{Address, Hash, Measurement};
use thiserror::Error;

/// Consensus errors.
///
/// Header verification reports these unchanged; the host decides what to
/// do with the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    // Input shape
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid extra-data: {0}")]
    InvalidExtra(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    // Attestation
    #[error("Invalid SGX quote: {0}")]
    InvalidQuote(String),

    #[error("Quote verification failed: {0}")]
    QuoteVerificationFailed(String),

    #[error("Invalid producer id: extra carries {}, quote commits to {}", hex::encode(.claimed), hex::encode(.actual))]
    InvalidProducerId { claimed: Address, actual: Address },

    #[error("Attestation too old: attested at {attestation_ts}, now {now}")]
    AttestationTooOld { attestation_ts: u64, now: u64 },

    #[error("Quote report data does not bind this header")]
    QuoteUserDataMismatch,

    #[error("Invalid MR: {0}")]
    InvalidMr(String),

    #[error("MR not allowed: {0}")]
    MrNotAllowed(Measurement),

    #[error("Attestation unavailable: {0}")]
    AttestationUnavailable(String),

    #[error("Enclave signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    // Header semantics
    #[error("Block from the future: timestamp {timestamp}, now {now}")]
    FutureBlock { timestamp: u64, now: u64 },

    #[error("Invalid timestamp: block {block} <= parent {parent}")]
    InvalidTimestamp { block: u64, parent: u64 },

    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(u64),

    #[error("Unknown ancestor: {}", hex::encode(.0))]
    UnknownAncestor(Hash),

    // Production
    #[error("No transactions to include")]
    NoTransactions,

    #[error("Too many transactions: {count} > {limit}")]
    TooManyTransactions { count: usize, limit: usize },

    #[error("Block interval too short: {elapsed_ms} ms < {min_ms} ms")]
    BlockIntervalTooShort { elapsed_ms: u64, min_ms: u64 },

    #[error("Node is in upgrade read-only mode")]
    UpgradeReadOnly,

    // Reward
    #[error("Invalid reward: {0}")]
    InvalidReward(String),

    #[error("No reward data")]
    NoRewardData,

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    // Reputation
    #[error("Node {} is excluded until {until}", hex::encode(.address))]
    NodeExcluded { address: Address, until: u64 },

    #[error("Reputation {reputation} of {} below minimum", hex::encode(.address))]
    LowReputation { address: Address, reputation: u64 },

    // Host
    #[error("State error: {0}")]
    StateError(String),

    // Lifecycle
    #[error("Consensus engine stopped")]
    Stopped,
}

impl ConsensusError {
    /// Snake-case error kind, used for metrics labels and RPC payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidExtra(_) => "invalid_extra",
            Self::InvalidHeader(_) => "invalid_header",
            Self::InvalidBlock(_) => "invalid_block",
            Self::InvalidQuote(_) => "invalid_SGX_quote",
            Self::QuoteVerificationFailed(_) => "quote_verification_failed",
            Self::InvalidProducerId { .. } => "invalid_producer_id",
            Self::AttestationTooOld { .. } => "attestation_too_old",
            Self::QuoteUserDataMismatch => "quote_user_data_mismatch",
            Self::InvalidMr(_) => "invalid_MR",
            Self::MrNotAllowed(_) => "MR_not_allowed",
            Self::AttestationUnavailable(_) => "attestation_unavailable",
            Self::SigningFailed(_) => "signing_failed",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::FutureBlock { .. } => "future_block",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::InvalidDifficulty(_) => "invalid_difficulty",
            Self::UnknownAncestor(_) => "unknown_ancestor",
            Self::NoTransactions => "no_transactions",
            Self::TooManyTransactions { .. } => "too_many_transactions",
            Self::BlockIntervalTooShort { .. } => "block_interval_too_short",
            Self::UpgradeReadOnly => "upgrade_read_only_mode",
            Self::InvalidReward(_) => "invalid_reward",
            Self::NoRewardData => "no_reward_data",
            Self::ServiceNotFound(_) => "service_not_found",
            Self::NodeExcluded { .. } => "node_excluded",
            Self::LowReputation { .. } => "low_reputation",
            Self::StateError(_) => "state_error",
            Self::Stopped => "stopped",
        }
    }
}

impl From<AttestationError> for ConsensusError {
    fn from(err: AttestationError) -> Self {
        match err {
            AttestationError::InvalidQuote(msg) => Self::InvalidQuote(msg),
            AttestationError::VerificationFailed(_)
            | AttestationError::UntrustedSigner(_)
            | AttestationError::DebugEnclave
            | AttestationError::Timeout(_) => Self::QuoteVerificationFailed(err.to_string()),
            AttestationError::InvalidMeasurement { .. } => Self::InvalidMr(err.to_string()),
            AttestationError::MeasurementNotAllowed(mr) => Self::MrNotAllowed(mr),
            AttestationError::SigningFailed(msg) => Self::SigningFailed(msg),
            AttestationError::Io(_)
            | AttestationError::UnsupportedAttestationType(_)
            | AttestationError::KeyNotFound(_)
            | AttestationError::PermissionDenied(_) => Self::AttestationUnavailable(err.to_string()),
        }
    }
}

impl From<GovernanceError> for ConsensusError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::UpgradeReadOnlyMode => Self::UpgradeReadOnly,
            GovernanceError::MrNotAllowed(mr) => Self::MrNotAllowed(mr),
            GovernanceError::Attestation(inner) => inner.into(),
            other => Self::StateError(other.to_string()),
        }
    }
}

impl From<rlp::DecoderError> for ConsensusError {
    fn from(err: rlp::DecoderError) -> Self {
        Self::InvalidExtra(err.to_string())
    }
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
