//! Validator staking ledger.
//!
//! Community validators join by staking; core validators are admitted by
//! governance or the bootstrap hand-off. Records are returned by value.

use crate::config::StakingConfig;
use crate::error::{GovernanceError, GovernanceResult};
use parking_lot::RwLock;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Measurement};
use std::collections::HashMap;
use tracing::{info, warn};

/// Tally chamber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chamber {
    Core,
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    Active,
    Inactive,
    Jailed,
    Exiting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub address: Address,
    pub chamber: Chamber,
    pub mr_enclave: Measurement,
    pub stake: U256,
    pub joined_at: u64,
    pub last_active_at: u64,
    pub voting_power: u64,
    pub status: ValidatorStatus,
    pub accrued_rewards: U256,
    pub last_accrual_block: u64,
}

impl ValidatorRecord {
    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Active
    }
}

/// Stake waiting out the unstake lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWithdrawal {
    pub amount: U256,
    pub unlock_block: u64,
}

#[derive(Default)]
struct LedgerState {
    validators: HashMap<Address, ValidatorRecord>,
    withdrawals: HashMap<Address, Vec<PendingWithdrawal>>,
}

/// Stake / unstake / slash / reward bookkeeping.
pub struct ValidatorLedger {
    config: StakingConfig,
    state: RwLock<LedgerState>,
}

impl ValidatorLedger {
    pub fn new(config: StakingConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Add stake; first stake creates an active community validator.
    pub fn stake(&self, address: Address, amount: U256, current_block: u64) -> GovernanceResult<U256> {
        if amount < self.config.min_stake {
            return Err(GovernanceError::InsufficientStake(format!(
                "{} < minimum {}",
                amount, self.config.min_stake
            )));
        }
        let mut state = self.state.write();
        let record = state
            .validators
            .entry(address)
            .or_insert_with(|| ValidatorRecord {
                address,
                chamber: Chamber::Community,
                mr_enclave: Measurement::default(),
                stake: U256::zero(),
                joined_at: current_block,
                last_active_at: current_block,
                voting_power: 1,
                status: ValidatorStatus::Active,
                accrued_rewards: U256::zero(),
                last_accrual_block: current_block,
            });
        record.stake = record.stake.saturating_add(amount);
        if record.status == ValidatorStatus::Inactive && record.stake >= self.config.min_stake {
            record.status = ValidatorStatus::Active;
        }
        info!(
            validator = %hex::encode(address),
            stake = %record.stake,
            "[ec-02] stake added"
        );
        Ok(record.stake)
    }

    /// Move `amount` into a locked withdrawal. Returns the unlock block.
    pub fn unstake(&self, address: Address, amount: U256, current_block: u64) -> GovernanceResult<u64> {
        let mut state = self.state.write();
        let record = state
            .validators
            .get_mut(&address)
            .ok_or(GovernanceError::ValidatorNotFound(address))?;
        if amount > record.stake {
            return Err(GovernanceError::InsufficientBalance(format!(
                "unstake {} > stake {}",
                amount, record.stake
            )));
        }
        record.stake -= amount;
        if record.stake < self.config.min_stake && record.status == ValidatorStatus::Active {
            record.status = ValidatorStatus::Inactive;
        }
        let unlock_block = current_block + self.config.unstake_lock_blocks;
        state
            .withdrawals
            .entry(address)
            .or_default()
            .push(PendingWithdrawal {
                amount,
                unlock_block,
            });
        Ok(unlock_block)
    }

    /// Release every unlocked withdrawal.
    pub fn withdraw(&self, address: Address, current_block: u64) -> GovernanceResult<U256> {
        let mut state = self.state.write();
        let pending = state
            .withdrawals
            .get_mut(&address)
            .ok_or(GovernanceError::NothingToWithdraw)?;
        let mut released = U256::zero();
        pending.retain(|w| {
            if w.unlock_block <= current_block {
                released = released.saturating_add(w.amount);
                false
            } else {
                true
            }
        });
        if pending.is_empty() {
            state.withdrawals.remove(&address);
        }
        if released.is_zero() {
            return Err(GovernanceError::NothingToWithdraw);
        }
        Ok(released)
    }

    pub fn pending_withdrawals(&self, address: &Address) -> Vec<PendingWithdrawal> {
        self.state
            .read()
            .withdrawals
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Burn `slashing_rate_percent` of stake; jail below the minimum.
    pub fn slash(&self, address: Address, reason: &str) -> GovernanceResult<U256> {
        let mut state = self.state.write();
        let record = state
            .validators
            .get_mut(&address)
            .ok_or(GovernanceError::ValidatorNotFound(address))?;
        let penalty = record.stake * U256::from(self.config.slashing_rate_percent) / U256::from(100u64);
        record.stake -= penalty;
        if record.stake < self.config.min_stake {
            record.status = ValidatorStatus::Jailed;
        }
        warn!(
            validator = %hex::encode(address),
            %penalty,
            reason,
            status = ?record.status,
            "[ec-02] validator slashed"
        );
        Ok(penalty)
    }

    /// Credit `stake * annual_rate * elapsed / blocks_per_year` to every active validator.
    pub fn accrue_rewards(&self, current_block: u64) {
        let mut state = self.state.write();
        for record in state.validators.values_mut() {
            let elapsed = current_block.saturating_sub(record.last_accrual_block);
            if elapsed == 0 {
                continue;
            }
            if record.is_active() {
                let reward = record.stake
                    * U256::from(self.config.annual_reward_rate_bps)
                    * U256::from(elapsed)
                    / U256::from(10_000u64)
                    / U256::from(self.config.blocks_per_year);
                record.accrued_rewards = record.accrued_rewards.saturating_add(reward);
            }
            record.last_accrual_block = current_block;
        }
    }

    /// Drain accrued rewards.
    pub fn claim_rewards(&self, address: Address) -> GovernanceResult<U256> {
        let mut state = self.state.write();
        let record = state
            .validators
            .get_mut(&address)
            .ok_or(GovernanceError::ValidatorNotFound(address))?;
        Ok(std::mem::take(&mut record.accrued_rewards))
    }

    pub fn update_mr_enclave(&self, address: Address, mr: Measurement) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let record = state
            .validators
            .get_mut(&address)
            .ok_or(GovernanceError::ValidatorNotFound(address))?;
        record.mr_enclave = mr;
        Ok(())
    }

    /// Insert or promote an active core validator.
    pub fn add_core_validator(&self, address: Address, mr: Measurement, current_block: u64) {
        let mut state = self.state.write();
        let record = state
            .validators
            .entry(address)
            .or_insert_with(|| ValidatorRecord {
                address,
                chamber: Chamber::Core,
                mr_enclave: mr,
                stake: U256::zero(),
                joined_at: current_block,
                last_active_at: current_block,
                voting_power: 1,
                status: ValidatorStatus::Active,
                accrued_rewards: U256::zero(),
                last_accrual_block: current_block,
            });
        record.chamber = Chamber::Core;
        record.status = ValidatorStatus::Active;
        if !mr.is_zero() {
            record.mr_enclave = mr;
        }
    }

    pub fn set_status(&self, address: Address, status: ValidatorStatus) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let record = state
            .validators
            .get_mut(&address)
            .ok_or(GovernanceError::ValidatorNotFound(address))?;
        record.status = status;
        Ok(())
    }

    pub fn record_activity(&self, address: Address, current_block: u64) {
        if let Some(record) = self.state.write().validators.get_mut(&address) {
            record.last_active_at = record.last_active_at.max(current_block);
        }
    }

    pub fn get(&self, address: &Address) -> Option<ValidatorRecord> {
        self.state.read().validators.get(address).cloned()
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.state
            .read()
            .validators
            .get(address)
            .map(ValidatorRecord::is_active)
            .unwrap_or(false)
    }

    /// Active validator, or the matching error.
    pub fn require_active(&self, address: &Address) -> GovernanceResult<ValidatorRecord> {
        let record = self
            .get(address)
            .ok_or(GovernanceError::ValidatorNotFound(*address))?;
        if !record.is_active() {
            return Err(GovernanceError::ValidatorNotActive(*address));
        }
        Ok(record)
    }

    fn by_chamber(&self, chamber: Chamber) -> Vec<ValidatorRecord> {
        self.state
            .read()
            .validators
            .values()
            .filter(|r| r.chamber == chamber)
            .cloned()
            .collect()
    }

    pub fn get_core_validators(&self) -> Vec<ValidatorRecord> {
        self.by_chamber(Chamber::Core)
    }

    pub fn get_community_validators(&self) -> Vec<ValidatorRecord> {
        self.by_chamber(Chamber::Community)
    }

    pub fn get_all(&self) -> Vec<ValidatorRecord> {
        self.state.read().validators.values().cloned().collect()
    }

    pub fn get_voter_type(&self, address: &Address) -> Option<Chamber> {
        self.state.read().validators.get(address).map(|r| r.chamber)
    }

    /// Sum of voting power of active validators in a chamber.
    pub fn total_voting_power(&self, chamber: Chamber) -> u64 {
        self.state
            .read()
            .validators
            .values()
            .filter(|r| r.chamber == chamber && r.is_active())
            .map(|r| r.voting_power)
            .sum()
    }

    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .validators
            .values()
            .filter(|r| r.is_active())
            .count()
    }
}
