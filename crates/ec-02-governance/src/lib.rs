//! # ec-02-governance
//!
//! Governance core for Enclave-Chain.
//!
//! ## Components
//!
//! | Component | Owns |
//! |-----------|------|
//! | [`WhitelistManager`] | measurement → entry table |
//! | [`VotingManager`] | proposals, votes, two-chamber tallies |
//! | [`ValidatorLedger`] | stake, withdrawals, rewards, chambers |
//! | [`AdmissionController`] | node records, hardware ↔ validator binding |
//! | [`ProgressivePermission`] | time + uptime permission tiers |
//! | [`BootstrapContract`] | founder registration window |
//! | [`UpgradeModeChecker`] | read-only rules during a measurement change |
//!
//! [`GovernanceFacade`] composes them. The whitelist is only written by
//! [`GovernanceExecutor`] when a passed proposal executes, by the bootstrap
//! hand-off, or by a sync/snapshot restore.
//!
//! ## Pass rule
//!
//! ```text
//! core_yes / core_total      >= 67%   (emergency: 100%)
//! community_no / comm_total  <  34%   (emergency: 17%)
//! core turnout               >= 50%
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{load_snapshot, save_snapshot, InMemoryWhitelistSource};
pub use config::{
    ether, BootstrapConfig, GovernanceConfig, ProgressiveConfig, StakingConfig, UpgradeConfig,
    VotingConfig,
};
pub use domain::*;
pub use error::{GovernanceError, GovernanceResult};
pub use ports::{ProposalExecutor, WhitelistSource};
pub use service::{
    sync_whitelist_periodically, GovernanceExecutor, GovernanceFacade, GovernancePolicy,
};
