//! Governance domain: in-memory tables and pure rules.

pub mod admission;
pub mod bootstrap;
pub mod progressive;
pub mod proposal;
pub mod upgrade;
pub mod validator;
pub mod voting;
pub mod whitelist;

pub use admission::{AdmissionController, AdmissionRecord};
pub use bootstrap::{BootstrapContract, BootstrapState};
pub use progressive::{ProgressivePermission, ProgressiveRecord};
pub use proposal::{vote_digest, Proposal, ProposalStatus, ProposalTarget, ProposalType, Vote};
pub use upgrade::UpgradeModeChecker;
pub use validator::{Chamber, PendingWithdrawal, ValidatorLedger, ValidatorRecord, ValidatorStatus};
pub use voting::{passes, Tally, VotingManager};
pub use whitelist::{EntryStatus, PermissionLevel, WhitelistEntry, WhitelistManager};
