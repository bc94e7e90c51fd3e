//! Comprehensive block reward.
//!
//! Each bonus is `block_reward * score / 10000 * rate / 10000`. The
//! historical bonus uses `multiplier - 1` as its score, where
//!
//! ```text
//! multiplier = 1 + min(0.5, blocks / 10000) + min(0.5, active_days / 365)
//! ```

use crate::config::RewardConfig;
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Address, U256};
use std::collections::{BTreeMap, HashMap};

const BPS: u64 = 10_000;
const HALF_BPS: u64 = 5_000;
const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub block: U256,
    pub online: U256,
    pub quality_bonus: U256,
    pub service_bonus: U256,
    pub historical_bonus: U256,
    pub total: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProducerHistory {
    blocks: u64,
    first_block_at: u64,
}

pub struct RewardEngine {
    config: RewardConfig,
    history: RwLock<HashMap<Address, ProducerHistory>>,
    service_scores: RwLock<HashMap<Address, u64>>,
    /// epoch → producer → paid.
    epochs: RwLock<BTreeMap<u64, HashMap<Address, U256>>>,
}

fn bonus(base: U256, score_bps: u64, rate_bps: u64) -> U256 {
    base * U256::from(score_bps.min(BPS)) / U256::from(BPS) * U256::from(rate_bps) / U256::from(BPS)
}

impl RewardEngine {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            history: RwLock::new(HashMap::new()),
            service_scores: RwLock::new(HashMap::new()),
            epochs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    pub fn record_block_produced(&self, producer: Address, now: u64) {
        let mut history = self.history.write();
        let h = history.entry(producer).or_insert(ProducerHistory {
            blocks: 0,
            first_block_at: now,
        });
        h.blocks += 1;
    }

    pub fn blocks_produced(&self, producer: &Address) -> u64 {
        self.history.read().get(producer).map_or(0, |h| h.blocks)
    }

    /// `[10_000, 20_000]` bps.
    pub fn historical_multiplier_bps(&self, producer: &Address, now: u64) -> u64 {
        let Some(h) = self.history.read().get(producer).copied() else {
            return BPS;
        };
        let block_part = h.blocks.min(HALF_BPS);
        let days = now.saturating_sub(h.first_block_at) / SECS_PER_DAY;
        let day_part = (days.saturating_mul(BPS) / 365).min(HALF_BPS);
        BPS + block_part + day_part
    }

    pub fn set_service_score(&self, address: Address, score: u64) {
        self.service_scores.write().insert(address, score.min(BPS));
    }

    pub fn service_score(&self, address: &Address) -> ConsensusResult<u64> {
        self.service_scores
            .read()
            .get(address)
            .copied()
            .ok_or_else(|| ConsensusError::ServiceNotFound(format!("0x{}", hex::encode(address))))
    }

    pub fn comprehensive(
        &self,
        address: &Address,
        block_reward: U256,
        uptime_score: u64,
        quality_score: u64,
        service_score: u64,
        now: u64,
    ) -> RewardBreakdown {
        let c = &self.config;
        let online = bonus(block_reward, uptime_score, c.online_rate_bps);
        let quality_bonus = bonus(block_reward, quality_score, c.quality_rate_bps);
        let service_bonus = bonus(block_reward, service_score, c.service_rate_bps);
        let historical = self.historical_multiplier_bps(address, now) - BPS;
        let historical_bonus = bonus(block_reward, historical, c.historical_rate_bps);
        RewardBreakdown {
            block: block_reward,
            online,
            quality_bonus,
            service_bonus,
            historical_bonus,
            total: block_reward + online + quality_bonus + service_bonus + historical_bonus,
        }
    }

    pub fn epoch_of(&self, now: u64) -> u64 {
        now / self.config.epoch_duration_secs.max(1)
    }

    pub fn record_payout(&self, producer: Address, amount: U256, now: u64) {
        let epoch = self.epoch_of(now);
        let mut epochs = self.epochs.write();
        let paid = epochs.entry(epoch).or_default().entry(producer).or_default();
        *paid = paid.saturating_add(amount);
    }

    pub fn epoch_payouts(&self, epoch: u64) -> HashMap<Address, U256> {
        self.epochs.read().get(&epoch).cloned().unwrap_or_default()
    }
}
