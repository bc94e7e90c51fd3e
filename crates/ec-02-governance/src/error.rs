//! Error types for the governance subsystem.

use ec_01_attestation::AttestationError;
use shared_types::{Address, Hash, Measurement};
use thiserror::Error;

fn short(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}

/// Governance errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Proposal not found: {}", short(.0))]
    ProposalNotFound(Hash),

    #[error("Proposal {} is not pending", short(.0))]
    ProposalNotPending(Hash),

    #[error("Validator {} already voted", short(.0))]
    AlreadyVoted(Address),

    #[error("Voter {} is not an active validator", short(.0))]
    InvalidVoter(Address),

    #[error("Vote signature does not recover to the voter")]
    InvalidSignature,

    #[error("Voting period ended at block {0}")]
    VotingPeriodEnded(u64),

    #[error("Proposal {} has not passed", short(.0))]
    ProposalNotPassed(Hash),

    #[error("Execution delay not met: executable after block {execute_after}, now {current}")]
    ExecutionDelayNotMet { execute_after: u64, current: u64 },

    #[error("Proposal {} already executed", short(.0))]
    ProposalAlreadyExecuted(Hash),

    #[error("Only the proposer may cancel")]
    NotProposer,

    #[error("MR already in whitelist: {0}")]
    MrAlreadyExists(Measurement),

    #[error("MR not in whitelist: {0}")]
    MrNotFound(Measurement),

    #[error("Permission upgrade must raise the level")]
    InvalidPermissionUpgrade,

    #[error("Invalid MR: expected {expected}, got {actual}")]
    InvalidMr {
        expected: Measurement,
        actual: Measurement,
    },

    #[error("MR not allowed: {0}")]
    MrNotAllowed(Measurement),

    #[error("Validator not found: {}", short(.0))]
    ValidatorNotFound(Address),

    #[error("Insufficient stake: {0}")]
    InsufficientStake(String),

    #[error("Validator {} is not active", short(.0))]
    ValidatorNotActive(Address),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Admission denied: {0}")]
    AdmissionDenied(String),

    #[error("Hardware already registered to {}", short(.0))]
    HardwareAlreadyRegistered(Address),

    #[error("Node not found")]
    NodeNotFound,

    #[error("Node is in upgrade read-only mode")]
    UpgradeReadOnlyMode,

    #[error("Bootstrap has ended")]
    BootstrapEnded,

    #[error("Maximum founders reached: {0}")]
    MaxFoundersReached(u32),

    #[error("Founder {} already registered", short(.0))]
    FounderAlreadyRegistered(Address),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Whitelist source error: {0}")]
    Source(String),

    #[error("Attestation error: {0}")]
    Attestation(#[from] AttestationError),
}

impl GovernanceError {
    /// Snake-case error kind, used for metrics labels and RPC payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidProposal(_) => "invalid_proposal",
            Self::ProposalNotFound(_) => "proposal_not_found",
            Self::ProposalNotPending(_) => "proposal_not_pending",
            Self::AlreadyVoted(_) => "already_voted",
            Self::InvalidVoter(_) => "invalid_voter",
            Self::InvalidSignature => "invalid_signature",
            Self::VotingPeriodEnded(_) => "voting_period_ended",
            Self::ProposalNotPassed(_) => "proposal_not_passed",
            Self::ExecutionDelayNotMet { .. } => "execution_delay_not_met",
            Self::ProposalAlreadyExecuted(_) => "proposal_already_executed",
            Self::NotProposer => "not_proposer",
            Self::MrAlreadyExists(_) => "mr_already_exists",
            Self::MrNotFound(_) => "mr_not_found",
            Self::InvalidPermissionUpgrade => "invalid_permission_upgrade",
            Self::InvalidMr { .. } => "invalid_MR",
            Self::MrNotAllowed(_) => "MR_not_allowed",
            Self::ValidatorNotFound(_) => "validator_not_found",
            Self::InsufficientStake(_) => "insufficient_stake",
            Self::ValidatorNotActive(_) => "validator_not_active",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::NothingToWithdraw => "nothing_to_withdraw",
            Self::AdmissionDenied(_) => "admission_denied",
            Self::HardwareAlreadyRegistered(_) => "hardware_already_registered",
            Self::NodeNotFound => "node_not_found",
            Self::UpgradeReadOnlyMode => "upgrade_read_only_mode",
            Self::BootstrapEnded => "bootstrap_ended",
            Self::MaxFoundersReached(_) => "max_founders_reached",
            Self::FounderAlreadyRegistered(_) => "founder_already_registered",
            Self::Snapshot(_) => "snapshot_io",
            Self::Source(_) => "whitelist_source",
            Self::Attestation(e) => e.kind(),
        }
    }
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
