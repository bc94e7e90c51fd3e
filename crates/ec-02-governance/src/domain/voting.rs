//! Two-chamber voting state machine.
//!
//! ```text
//! create ──→ Pending ──(close)──→ Passed ──(execute)──→ Executed
//!              │                    │
//!              │                    └──(stale)──→ Expired
//!              ├──(close)──→ Rejected
//!              └──(cancel)──→ Cancelled
//! ```

use crate::config::VotingConfig;
use crate::domain::proposal::{vote_digest, Proposal, ProposalStatus, ProposalType, Vote};
use crate::domain::validator::{Chamber, ValidatorLedger};
use crate::error::{GovernanceError, GovernanceResult};
use crate::ports::ProposalExecutor;
use parking_lot::RwLock;
use shared_types::{Address, Hash};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-chamber tallies for a closed proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub core_yes: u64,
    pub core_no: u64,
    pub core_total: u64,
    pub community_yes: u64,
    pub community_no: u64,
    pub community_total: u64,
}

/// Pass rule for a closed proposal.
///
/// Core: `yes/total >= threshold` and turnout `>= min_participation`.
/// Community: `no/total < veto`. An empty community chamber cannot veto.
pub fn passes(config: &VotingConfig, kind: ProposalType, tally: &Tally) -> bool {
    let (core_threshold, veto) = if kind.is_emergency() {
        (config.emergency_core_threshold_percent, config.emergency_veto_percent)
    } else {
        (config.core_threshold_percent, config.community_veto_percent)
    };
    if tally.core_total == 0 {
        return false;
    }
    let turnout = tally.core_yes + tally.core_no;
    if turnout * 100 < config.min_participation_percent * tally.core_total {
        return false;
    }
    if tally.core_yes * 100 < core_threshold * tally.core_total {
        return false;
    }
    if tally.community_total > 0 && tally.community_no * 100 >= veto * tally.community_total {
        return false;
    }
    true
}

#[derive(Default)]
struct VotingState {
    proposals: HashMap<Hash, Proposal>,
    votes: HashMap<Hash, Vec<Vote>>,
}

/// Proposal store and tally engine.
pub struct VotingManager {
    config: VotingConfig,
    ledger: Arc<ValidatorLedger>,
    state: RwLock<VotingState>,
}

impl VotingManager {
    pub fn new(config: VotingConfig, ledger: Arc<ValidatorLedger>) -> Self {
        Self {
            config,
            ledger,
            state: RwLock::new(VotingState::default()),
        }
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// File a proposal at `current_block`. Returns its id.
    pub fn create(
        &self,
        proposal_type: ProposalType,
        proposer: Address,
        target: Vec<u8>,
        description: String,
        current_block: u64,
    ) -> GovernanceResult<Hash> {
        let id = Proposal::compute_id(proposal_type, &proposer, &target, current_block);
        let voting_ends_at = current_block + self.config.voting_period_blocks;
        let proposal = Proposal {
            id,
            proposal_type,
            proposer,
            target,
            description,
            created_at: current_block,
            voting_ends_at,
            execute_after: voting_ends_at + self.config.execution_delay_blocks,
            status: ProposalStatus::Pending,
            core_yes: 0,
            core_no: 0,
            community_yes: 0,
            community_no: 0,
        };
        // Fail early on an undecodable target.
        proposal.decoded_target()?;

        let mut state = self.state.write();
        if state.proposals.contains_key(&id) {
            return Err(GovernanceError::InvalidProposal(
                "duplicate proposal in the same block".into(),
            ));
        }
        state.proposals.insert(id, proposal);
        info!(
            proposal_id = %hex::encode(id),
            kind = ?proposal_type,
            proposer = %hex::encode(proposer),
            voting_ends_at,
            "[ec-02] proposal created"
        );
        Ok(id)
    }

    /// Cast a vote. A non-empty `signature` must recover to `voter`.
    pub fn vote(
        &self,
        id: &Hash,
        voter: Address,
        support: bool,
        signature: &[u8],
        current_block: u64,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let proposal = state
            .proposals
            .get(id)
            .ok_or(GovernanceError::ProposalNotFound(*id))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(GovernanceError::ProposalNotPending(*id));
        }
        if current_block >= proposal.voting_ends_at {
            return Err(GovernanceError::VotingPeriodEnded(proposal.voting_ends_at));
        }
        let record = self
            .ledger
            .get(&voter)
            .filter(|r| r.is_active())
            .ok_or(GovernanceError::InvalidVoter(voter))?;
        if state
            .votes
            .get(id)
            .map(|votes| votes.iter().any(|v| v.voter == voter))
            .unwrap_or(false)
        {
            return Err(GovernanceError::AlreadyVoted(voter));
        }
        if !signature.is_empty() {
            let recovered = shared_crypto::recover_address(&vote_digest(id, support), signature)
                .map_err(|_| GovernanceError::InvalidSignature)?;
            if recovered != voter {
                return Err(GovernanceError::InvalidSignature);
            }
        }

        let weight = record.voting_power;
        if let Some(proposal) = state.proposals.get_mut(id) {
            match (record.chamber, support) {
                (Chamber::Core, true) => proposal.core_yes += weight,
                (Chamber::Core, false) => proposal.core_no += weight,
                (Chamber::Community, true) => proposal.community_yes += weight,
                (Chamber::Community, false) => proposal.community_no += weight,
            }
        }
        state.votes.entry(*id).or_default().push(Vote {
            proposal_id: *id,
            voter,
            support,
            weight,
            timestamp: current_block,
            signature: signature.to_vec(),
        });
        debug!(
            proposal_id = %hex::encode(id),
            voter = %hex::encode(voter),
            support,
            weight,
            "[ec-02] vote recorded"
        );
        Ok(())
    }

    /// Close a pending proposal once its voting period has ended.
    pub fn check_status(&self, id: &Hash, current_block: u64) -> GovernanceResult<ProposalStatus> {
        let mut state = self.state.write();
        let proposal = state
            .proposals
            .get_mut(id)
            .ok_or(GovernanceError::ProposalNotFound(*id))?;
        if proposal.status != ProposalStatus::Pending || current_block < proposal.voting_ends_at {
            return Ok(proposal.status);
        }
        let tally = Tally {
            core_yes: proposal.core_yes,
            core_no: proposal.core_no,
            core_total: self.ledger.total_voting_power(Chamber::Core),
            community_yes: proposal.community_yes,
            community_no: proposal.community_no,
            community_total: self.ledger.total_voting_power(Chamber::Community),
        };
        proposal.status = if passes(&self.config, proposal.proposal_type, &tally) {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Rejected
        };
        info!(
            proposal_id = %hex::encode(id),
            status = ?proposal.status,
            core_yes = tally.core_yes,
            core_total = tally.core_total,
            community_no = tally.community_no,
            community_total = tally.community_total,
            "[ec-02] proposal closed"
        );
        Ok(proposal.status)
    }

    /// Execute a passed proposal exactly once.
    pub fn execute(
        &self,
        id: &Hash,
        current_block: u64,
        executor: &dyn ProposalExecutor,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let proposal = state
            .proposals
            .get_mut(id)
            .ok_or(GovernanceError::ProposalNotFound(*id))?;
        match proposal.status {
            ProposalStatus::Passed => {}
            ProposalStatus::Executed => return Err(GovernanceError::ProposalAlreadyExecuted(*id)),
            _ => return Err(GovernanceError::ProposalNotPassed(*id)),
        }
        if current_block < proposal.execute_after {
            return Err(GovernanceError::ExecutionDelayNotMet {
                execute_after: proposal.execute_after,
                current: current_block,
            });
        }
        executor.execute(proposal, current_block)?;
        proposal.status = ProposalStatus::Executed;
        info!(proposal_id = %hex::encode(id), "[ec-02] proposal executed");
        Ok(())
    }

    /// Withdraw a pending proposal. Only its proposer may cancel.
    pub fn cancel(&self, id: &Hash, caller: Address) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let proposal = state
            .proposals
            .get_mut(id)
            .ok_or(GovernanceError::ProposalNotFound(*id))?;
        if proposal.proposer != caller {
            return Err(GovernanceError::NotProposer);
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(GovernanceError::ProposalNotPending(*id));
        }
        proposal.status = ProposalStatus::Cancelled;
        Ok(())
    }

    /// Expire passed proposals left unexecuted for a further voting period.
    pub fn expire_stale(&self, current_block: u64) -> Vec<Hash> {
        let mut state = self.state.write();
        let mut expired = Vec::new();
        for proposal in state.proposals.values_mut() {
            if proposal.status == ProposalStatus::Passed
                && current_block >= proposal.execute_after + self.config.voting_period_blocks
            {
                proposal.status = ProposalStatus::Expired;
                expired.push(proposal.id);
            }
        }
        expired
    }

    /// Close every pending proposal whose period ended. Returns `(id, status)` pairs.
    pub fn close_due(&self, current_block: u64) -> Vec<(Hash, ProposalStatus)> {
        let due: Vec<Hash> = self
            .state
            .read()
            .proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Pending && current_block >= p.voting_ends_at)
            .map(|p| p.id)
            .collect();
        due.into_iter()
            .filter_map(|id| self.check_status(&id, current_block).ok().map(|s| (id, s)))
            .collect()
    }

    /// Passed proposals whose execution delay has elapsed.
    pub fn executable(&self, current_block: u64) -> Vec<Hash> {
        self.state
            .read()
            .proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Passed && current_block >= p.execute_after)
            .map(|p| p.id)
            .collect()
    }

    pub fn get_proposal(&self, id: &Hash) -> Option<Proposal> {
        self.state.read().proposals.get(id).cloned()
    }

    pub fn get_votes(&self, id: &Hash) -> Vec<Vote> {
        self.state.read().votes.get(id).cloned().unwrap_or_default()
    }

    pub fn proposals_with_status(&self, status: ProposalStatus) -> Vec<Proposal> {
        let mut out: Vec<_> = self
            .state
            .read()
            .proposals
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.created_at, p.id));
        out
    }
}
