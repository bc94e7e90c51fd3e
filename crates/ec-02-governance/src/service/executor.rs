//! Applies passed proposals to governance state.

use crate::domain::{
    EntryStatus, PermissionLevel, Proposal, ProposalTarget, ProposalType, UpgradeModeChecker,
    ValidatorLedger, ValidatorStatus, WhitelistManager,
};
use crate::error::{GovernanceError, GovernanceResult};
use crate::ports::ProposalExecutor;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The only writer of the whitelist and of governance-admitted validators.
pub struct GovernanceExecutor {
    whitelist: Arc<WhitelistManager>,
    ledger: Arc<ValidatorLedger>,
    upgrade: Arc<UpgradeModeChecker>,
    parameters: RwLock<BTreeMap<String, String>>,
    upgrade_window_blocks: u64,
}

impl GovernanceExecutor {
    pub fn new(
        whitelist: Arc<WhitelistManager>,
        ledger: Arc<ValidatorLedger>,
        upgrade: Arc<UpgradeModeChecker>,
        upgrade_window_blocks: u64,
    ) -> Self {
        Self {
            whitelist,
            ledger,
            upgrade,
            parameters: RwLock::new(BTreeMap::new()),
            upgrade_window_blocks,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<String> {
        self.parameters.read().get(key).cloned()
    }

    pub fn parameters(&self) -> BTreeMap<String, String> {
        self.parameters.read().clone()
    }

    fn activate(&self, proposal: &Proposal, mr: shared_types::Measurement, block: u64) {
        if !self.whitelist.set_status(&mr, EntryStatus::Active) {
            self.whitelist.insert(
                mr,
                EntryStatus::Active,
                PermissionLevel::Basic,
                block,
                proposal.proposer,
            );
        }
    }
}

impl ProposalExecutor for GovernanceExecutor {
    fn execute(&self, proposal: &Proposal, current_block: u64) -> GovernanceResult<()> {
        match (proposal.proposal_type, proposal.decoded_target()?) {
            (ProposalType::AddMrEnclave, ProposalTarget::Measurement(mr)) => {
                if self.whitelist.contains(&mr) {
                    return Err(GovernanceError::MrAlreadyExists(mr));
                }
                self.whitelist.insert(
                    mr,
                    EntryStatus::Approved,
                    PermissionLevel::Basic,
                    current_block,
                    proposal.proposer,
                );
            }
            (ProposalType::RemoveMrEnclave, ProposalTarget::Measurement(mr)) => {
                if !self.whitelist.set_status(&mr, EntryStatus::Deprecated) {
                    return Err(GovernanceError::MrNotFound(mr));
                }
            }
            (ProposalType::UpgradePermission, ProposalTarget::Permission(mr, level)) => {
                let entry = self
                    .whitelist
                    .get_entry(&mr)
                    .ok_or(GovernanceError::MrNotFound(mr))?;
                if level <= entry.permission_level {
                    return Err(GovernanceError::InvalidPermissionUpgrade);
                }
                self.whitelist.set_permission_level(&mr, level);
            }
            (ProposalType::AddValidator, ProposalTarget::Validator(address)) => {
                self.ledger
                    .add_core_validator(address, shared_types::Measurement::default(), current_block);
            }
            (ProposalType::RemoveValidator, ProposalTarget::Validator(address)) => {
                self.ledger.set_status(address, ValidatorStatus::Exiting)?;
            }
            (ProposalType::ParameterChange, ProposalTarget::Parameter { key, value }) => {
                self.parameters.write().insert(key, value);
            }
            (ProposalType::NormalUpgrade, ProposalTarget::Measurement(mr)) => {
                self.activate(proposal, mr, current_block);
                self.upgrade
                    .set_upgrade_complete_block(current_block + self.upgrade_window_blocks);
            }
            (ProposalType::EmergencyUpgrade, ProposalTarget::Measurement(mr)) => {
                self.activate(proposal, mr, current_block);
                self.whitelist.deprecate_active_except(&mr);
            }
            (kind, target) => {
                return Err(GovernanceError::InvalidProposal(format!(
                    "target {:?} does not fit {:?}",
                    target, kind
                )))
            }
        }
        info!(
            proposal_id = %hex::encode(proposal.id),
            kind = ?proposal.proposal_type,
            block_height = current_block,
            "[ec-02] proposal applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StakingConfig;
    use crate::domain::{Proposal, ProposalStatus};
    use shared_types::Measurement;

    struct Fixture {
        whitelist: Arc<WhitelistManager>,
        ledger: Arc<ValidatorLedger>,
        upgrade: Arc<UpgradeModeChecker>,
        executor: GovernanceExecutor,
    }

    fn fixture() -> Fixture {
        let whitelist = Arc::new(WhitelistManager::new());
        let ledger = Arc::new(ValidatorLedger::new(StakingConfig::default()));
        let upgrade = Arc::new(UpgradeModeChecker::new(Measurement([2; 32]), whitelist.clone()));
        let executor = GovernanceExecutor::new(whitelist.clone(), ledger.clone(), upgrade.clone(), 50);
        Fixture {
            whitelist,
            ledger,
            upgrade,
            executor,
        }
    }

    fn proposal(kind: ProposalType, target: ProposalTarget) -> Proposal {
        let target = target.encode();
        Proposal {
            id: Proposal::compute_id(kind, &[1; 20], &target, 0),
            proposal_type: kind,
            proposer: [1; 20],
            target,
            description: String::new(),
            created_at: 0,
            voting_ends_at: 10,
            execute_after: 15,
            status: ProposalStatus::Passed,
            core_yes: 1,
            core_no: 0,
            community_yes: 0,
            community_no: 0,
        }
    }

    #[test]
    fn test_add_remove_mr() {
        let f = fixture();
        let mr = Measurement([1; 32]);
        f.executor
            .execute(&proposal(ProposalType::AddMrEnclave, ProposalTarget::Measurement(mr)), 20)
            .unwrap();
        assert_eq!(f.whitelist.get_entry(&mr).unwrap().status, EntryStatus::Approved);
        assert!(f
            .executor
            .execute(&proposal(ProposalType::AddMrEnclave, ProposalTarget::Measurement(mr)), 21)
            .is_err());

        f.executor
            .execute(&proposal(ProposalType::RemoveMrEnclave, ProposalTarget::Measurement(mr)), 22)
            .unwrap();
        assert!(!f.whitelist.is_allowed(&mr));
    }

    #[test]
    fn test_permission_must_rise() {
        let f = fixture();
        let mr = Measurement([1; 32]);
        f.whitelist
            .insert(mr, EntryStatus::Active, PermissionLevel::Standard, 0, [0; 20]);
        let down = proposal(
            ProposalType::UpgradePermission,
            ProposalTarget::Permission(mr, PermissionLevel::Basic),
        );
        assert_eq!(
            f.executor.execute(&down, 20),
            Err(GovernanceError::InvalidPermissionUpgrade)
        );
        let up = proposal(
            ProposalType::UpgradePermission,
            ProposalTarget::Permission(mr, PermissionLevel::Full),
        );
        f.executor.execute(&up, 20).unwrap();
        assert_eq!(f.whitelist.get_permission_level(&mr), PermissionLevel::Full);
    }

    #[test]
    fn test_validator_changes() {
        let f = fixture();
        f.executor
            .execute(&proposal(ProposalType::AddValidator, ProposalTarget::Validator([7; 20])), 20)
            .unwrap();
        assert!(f.ledger.is_active(&[7; 20]));
        f.executor
            .execute(&proposal(ProposalType::RemoveValidator, ProposalTarget::Validator([7; 20])), 21)
            .unwrap();
        assert_eq!(f.ledger.get(&[7; 20]).unwrap().status, ValidatorStatus::Exiting);
    }

    #[test]
    fn test_parameter_change() {
        let f = fixture();
        let target = ProposalTarget::Parameter {
            key: "max_block_interval".into(),
            value: "30".into(),
        };
        f.executor
            .execute(&proposal(ProposalType::ParameterChange, target), 20)
            .unwrap();
        assert_eq!(f.executor.parameter("max_block_interval").as_deref(), Some("30"));
    }

    #[test]
    fn test_normal_vs_emergency_upgrade() {
        let f = fixture();
        let old = Measurement([1; 32]);
        let new = Measurement([2; 32]);
        f.whitelist
            .insert(old, EntryStatus::Active, PermissionLevel::Full, 0, [0; 20]);

        f.executor
            .execute(&proposal(ProposalType::NormalUpgrade, ProposalTarget::Measurement(new)), 100)
            .unwrap();
        assert_eq!(f.whitelist.get_entry(&new).unwrap().status, EntryStatus::Active);
        assert!(f.whitelist.is_allowed(&old));
        assert_eq!(f.upgrade.upgrade_complete_block(), Some(150));

        f.executor
            .execute(&proposal(ProposalType::EmergencyUpgrade, ProposalTarget::Measurement(new)), 101)
            .unwrap();
        assert_eq!(f.whitelist.get_entry(&old).unwrap().status, EntryStatus::Deprecated);
    }
}
