//! Block quality scoring.
//!
//! All sub-scores and the total are in `[0, 10_000]`. The reward multiplier
//! is returned in basis points, `[1_000, 20_000]` (0.1x to 2.0x).

use crate::config::QualityConfig;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Block, U256};
use std::collections::HashSet;

pub const MAX_SCORE: u64 = 10_000;
pub const MIN_MULTIPLIER_BPS: u64 = 1_000;
pub const MAX_MULTIPLIER_BPS: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    High,
    Normal,
    Low,
}

impl QualityTier {
    pub fn from_score(score: u64) -> Self {
        match score {
            s if s >= 8_000 => Self::Excellent,
            s if s >= 5_000 => Self::High,
            s if s >= 2_000 => Self::Normal,
            _ => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityScore {
    pub tx_count_score: u64,
    pub block_size_score: u64,
    pub gas_util_score: u64,
    pub diversity_score: u64,
    pub total_score: u64,
    pub reward_multiplier_bps: u64,
    /// Filled in by candidate ranking; equals the tx count until then.
    pub new_tx_count: usize,
}

impl QualityScore {
    /// Display form of the multiplier.
    pub fn reward_multiplier(&self) -> f64 {
        self.reward_multiplier_bps as f64 / 10_000.0
    }

    pub fn tier(&self) -> QualityTier {
        QualityTier::from_score(self.total_score)
    }
}

/// Scores blocks against the configured targets.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn score(&self, block: &Block) -> QualityScore {
        let tx_count = block.tx_count();
        let senders: HashSet<Address> = block.transactions.iter().map(|tx| tx.from).collect();

        let tx_count_score = self.tx_count_score(tx_count as u64);
        let block_size_score = self.block_size_score(block.size() as u64);
        let gas_util_score = self.gas_util_score(block.header.gas_used, block.header.gas_limit);
        let diversity_score = diversity_score(senders.len(), tx_count);

        let c = &self.config;
        let total_score = ((tx_count_score * c.tx_count_weight
            + block_size_score * c.block_size_weight
            + gas_util_score * c.gas_utilization_weight
            + diversity_score * c.tx_diversity_weight)
            / 100)
            .min(MAX_SCORE);

        QualityScore {
            tx_count_score,
            block_size_score,
            gas_util_score,
            diversity_score,
            total_score,
            reward_multiplier_bps: reward_multiplier_bps(total_score),
            new_tx_count: tx_count,
        }
    }

    /// Linear to 2000 at the threshold, then 8000 plus a log2 bonus
    /// approaching 10000.
    pub fn tx_count_score(&self, tx_count: u64) -> u64 {
        let threshold = self.config.min_tx_threshold.max(1);
        if tx_count == 0 {
            return 0;
        }
        if tx_count < threshold {
            return (2_000 * tx_count / threshold).min(2_000);
        }
        let doublings = u64::from((tx_count / threshold).ilog2());
        8_000 + 2_000 * doublings / (doublings + 1)
    }

    pub fn block_size_score(&self, size: u64) -> u64 {
        let target = self.config.target_block_size.max(1);
        if size <= target {
            return MAX_SCORE * size / target;
        }
        let over = 2_000u64.saturating_mul(size - target) / target;
        MAX_SCORE.saturating_sub(over).max(8_000)
    }

    pub fn gas_util_score(&self, gas_used: u64, gas_limit: u64) -> u64 {
        if gas_limit == 0 {
            return 0;
        }
        let target = self.config.target_gas_utilization_bps.max(1);
        let util_bps = (u128::from(gas_used) * 10_000 / u128::from(gas_limit)) as u64;
        if util_bps >= target {
            MAX_SCORE
        } else {
            util_bps * MAX_SCORE / target
        }
    }
}

pub fn diversity_score(unique_senders: usize, tx_count: usize) -> u64 {
    if tx_count == 0 {
        return 0;
    }
    (unique_senders as u64 * MAX_SCORE / tx_count as u64).min(MAX_SCORE)
}

/// Piecewise-linear score → multiplier map:
///
/// ```text
/// [0, 2000]     → [0.1, 0.5]
/// [2000, 5000]  → [0.5, 1.0]
/// [5000, 8000]  → [1.0, 1.5]
/// [8000, 10000] → [1.5, 2.0]
/// ```
pub fn reward_multiplier_bps(score: u64) -> u64 {
    let s = score.min(MAX_SCORE);
    match s {
        0..=2_000 => 1_000 + 4_000 * s / 2_000,
        2_001..=5_000 => 5_000 + 5_000 * (s - 2_000) / 3_000,
        5_001..=8_000 => 10_000 + 5_000 * (s - 5_000) / 3_000,
        _ => 15_000 + 5_000 * (s - 8_000) / 2_000,
    }
}

/// Bonus paid on top of `base` for a multiplier above 1.0x.
pub fn quality_bonus(base: U256, multiplier_bps: u64) -> U256 {
    let excess = multiplier_bps.saturating_sub(10_000);
    base * U256::from(excess) / U256::from(10_000u64)
}
