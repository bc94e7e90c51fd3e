//! Driven ports (outbound dependencies).

use crate::domain::{Proposal, WhitelistEntry};
use crate::error::GovernanceResult;
use async_trait::async_trait;

/// Applies a passed proposal to governance state.
///
/// Called exactly once per proposal, under the voting store's write lock.
pub trait ProposalExecutor: Send + Sync {
    fn execute(&self, proposal: &Proposal, current_block: u64) -> GovernanceResult<()>;
}

/// Authoritative whitelist source (the on-chain registry).
#[async_trait]
pub trait WhitelistSource: Send + Sync {
    async fn fetch_entries(&self) -> GovernanceResult<Vec<WhitelistEntry>>;
}
