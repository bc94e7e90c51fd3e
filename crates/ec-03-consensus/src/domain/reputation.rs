//! Node reputation and producer priority.
//!
//! ```text
//! reputation = uptime * w_uptime / 100
//!            + success_bps * w_success / 100
//!            - min(penalties * 1000, 10000 * w_penalty / 100)
//! ```
//!
//! clamped to `[0, 10_000]`. Priority is the reputation.

use crate::config::ReputationConfig;
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::collections::HashMap;

const MAX_SCORE: u64 = 10_000;
const PENALTY_STEP: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub address: Address,
    pub uptime_score: u64,
    pub successful_blocks: u64,
    pub failed_blocks: u64,
    pub penalty_count: u64,
    pub reputation: u64,
    pub last_update: u64,
}

impl ReputationRecord {
    fn new(address: Address) -> Self {
        Self {
            address,
            uptime_score: 0,
            successful_blocks: 0,
            failed_blocks: 0,
            penalty_count: 0,
            reputation: 0,
            last_update: 0,
        }
    }

    /// Success rate in bps; a node with no history is not held against it.
    pub fn success_rate_bps(&self) -> u64 {
        let total = self.successful_blocks + self.failed_blocks;
        if total == 0 {
            return MAX_SCORE;
        }
        self.successful_blocks * MAX_SCORE / total
    }
}

pub struct ReputationManager {
    config: ReputationConfig,
    records: RwLock<HashMap<Address, ReputationRecord>>,
}

impl ReputationManager {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    fn compute(&self, record: &ReputationRecord) -> u64 {
        let c = &self.config;
        let positive = record.uptime_score.min(MAX_SCORE) * c.uptime_weight / 100
            + record.success_rate_bps() * c.success_weight / 100;
        let penalty = record
            .penalty_count
            .saturating_mul(PENALTY_STEP)
            .min(MAX_SCORE * c.penalty_weight / 100);
        positive.saturating_sub(penalty).min(MAX_SCORE)
    }

    fn update<F>(&self, address: Address, now: u64, f: F) -> u64
    where
        F: FnOnce(&mut ReputationRecord),
    {
        let mut records = self.records.write();
        let record = records
            .entry(address)
            .or_insert_with(|| ReputationRecord::new(address));
        f(record);
        record.last_update = now;
        record.reputation = self.compute(record);
        record.reputation
    }

    pub fn update_uptime(&self, address: Address, uptime_score: u64, now: u64) -> u64 {
        self.update(address, now, |r| r.uptime_score = uptime_score.min(MAX_SCORE))
    }

    pub fn record_block_result(&self, address: Address, success: bool, now: u64) -> u64 {
        self.update(address, now, |r| {
            if success {
                r.successful_blocks += 1;
            } else {
                r.failed_blocks += 1;
            }
        })
    }

    pub fn set_penalty_count(&self, address: Address, count: u64, now: u64) -> u64 {
        self.update(address, now, |r| r.penalty_count = count)
    }

    pub fn get(&self, address: &Address) -> Option<ReputationRecord> {
        self.records.read().get(address).copied()
    }

    /// Unknown nodes get the score a fresh record would have.
    pub fn reputation(&self, address: &Address) -> u64 {
        match self.get(address) {
            Some(record) => record.reputation,
            None => self.compute(&ReputationRecord::new(*address)),
        }
    }

    pub fn priority(&self, address: &Address) -> u64 {
        self.reputation(address)
    }

    /// Highest priority first, address as tie-break; at most `k`.
    pub fn select_top(&self, candidates: &[Address], k: usize) -> Vec<Address> {
        let mut scored: Vec<(u64, Address)> = candidates
            .iter()
            .map(|a| (self.priority(a), *a))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(k).map(|(_, a)| a).collect()
    }

    pub fn check_min(&self, address: &Address) -> ConsensusResult<()> {
        let reputation = self.reputation(address);
        if reputation < self.config.min_reputation {
            return Err(ConsensusError::LowReputation {
                address: *address,
                reputation,
            });
        }
        Ok(())
    }

    pub fn all(&self) -> Vec<ReputationRecord> {
        self.records.read().values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ReputationManager {
        ReputationManager::new(ReputationConfig::default())
    }

    #[test]
    fn test_fresh_node() {
        let m = manager();
        assert_eq!(m.reputation(&[1; 20]), 3_000);
        assert!(m.check_min(&[1; 20]).is_ok());
    }

    #[test]
    fn test_formula() {
        let m = manager();
        let a = [1; 20];
        m.update_uptime(a, 8_000, 1);
        m.record_block_result(a, true, 2);
        m.record_block_result(a, false, 3);
        // 4000 + 1500
        assert_eq!(m.reputation(&a), 5_500);
        m.set_penalty_count(a, 1, 4);
        assert_eq!(m.reputation(&a), 4_500);
        m.set_penalty_count(a, 10, 5);
        // Penalty capped at 2000.
        assert_eq!(m.reputation(&a), 3_500);
        assert_eq!(m.get(&a).unwrap().last_update, 5);
    }

    #[test]
    fn test_clamped_at_zero() {
        let m = manager();
        let a = [1; 20];
        m.record_block_result(a, false, 1);
        m.set_penalty_count(a, 5, 1);
        assert_eq!(m.reputation(&a), 0);
        assert_eq!(m.check_min(&a).unwrap_err().kind(), "low_reputation");
    }

    #[test]
    fn test_select_top() {
        let m = manager();
        m.update_uptime([1; 20], 2_000, 0);
        m.update_uptime([2; 20], 9_000, 0);
        m.update_uptime([3; 20], 5_000, 0);
        let top = m.select_top(&[[1; 20], [2; 20], [3; 20]], 2);
        assert_eq!(top, vec![[2; 20], [3; 20]]);
    }
}
