//! Multi-producer reward sharing.
//!
//! Candidates at one height are ranked by arrival. Rank 1 defines the
//! baseline transaction set; later candidates are paid only for
//! transactions rank 1 did not include:
//!
//! ```text
//! final_bps = speed_bps[rank-1] * quality_bps * (rank == 1 ? 1 : new / total) / 10_000
//! reward    = pool * final / Σ final          (rounded down)
//! ```

use super::candidates::BlockCandidate;
use super::quality::QualityScorer;
use crate::config::CandidateConfig;
use crate::error::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash, U256};
use std::collections::HashSet;

/// A distribution deviating from the pool by more than this (bps) is invalid.
pub const MAX_SHORTFALL_BPS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateReward {
    pub producer: Address,
    pub block_hash: Hash,
    pub rank: usize,
    pub new_tx_count: usize,
    pub final_multiplier_bps: u64,
    pub reward: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDistribution {
    pub rewards: Vec<CandidateReward>,
    pub total_distributed: U256,
    /// `pool - total_distributed`, left to the caller to burn or forward.
    pub residual: U256,
}

pub struct MultiProducerRewards {
    config: CandidateConfig,
    scorer: QualityScorer,
}

impl MultiProducerRewards {
    pub fn new(config: CandidateConfig, scorer: QualityScorer) -> Self {
        Self { config, scorer }
    }

    /// Sort by arrival, assign ranks, score quality and count new transactions.
    pub fn rank(&self, mut candidates: Vec<BlockCandidate>) -> Vec<BlockCandidate> {
        candidates.sort_by(|a, b| {
            a.received_at_ms
                .cmp(&b.received_at_ms)
                .then_with(|| a.hash().cmp(&b.hash()))
        });
        let baseline: HashSet<Hash> = candidates
            .first()
            .map(|c| c.block.tx_hashes().copied().collect())
            .unwrap_or_default();

        for (i, candidate) in candidates.iter_mut().enumerate() {
            candidate.rank = i + 1;
            candidate.quality = self.scorer.score(&candidate.block);
            candidate.new_tx_count = if candidate.rank == 1 {
                candidate.block.tx_count()
            } else {
                candidate
                    .block
                    .tx_hashes()
                    .filter(|h| !baseline.contains(*h))
                    .count()
            };
            candidate.quality.new_tx_count = candidate.new_tx_count;
        }
        candidates
    }

    /// Speed ratio times quality multiplier, scaled by novelty for rank > 1.
    /// Zero for a rank beyond the configured ratios or a redundant candidate.
    pub fn final_multiplier_bps(&self, candidate: &BlockCandidate) -> u64 {
        if candidate.rank == 0 {
            return 0;
        }
        let Some(speed) = self.config.speed_reward_ratios_bps.get(candidate.rank - 1) else {
            return 0;
        };
        let mut quality = candidate.quality.reward_multiplier_bps;
        if candidate.rank > 1 {
            let total = candidate.block.tx_count() as u64;
            if total == 0 || candidate.new_tx_count == 0 {
                return 0;
            }
            quality = quality * candidate.new_tx_count as u64 / total;
        }
        speed * quality / 10_000
    }

    pub fn distribute(&self, candidates: Vec<BlockCandidate>, pool: U256) -> RewardDistribution {
        let ranked = self.rank(candidates);
        let eligible: Vec<(BlockCandidate, u64)> = ranked
            .into_iter()
            .take(self.config.max_candidates)
            .filter(|c| c.rank == 1 || c.new_tx_count > 0)
            .map(|c| {
                let m = self.final_multiplier_bps(&c);
                (c, m)
            })
            .collect();

        let sum: u64 = eligible.iter().map(|(_, m)| *m).sum();
        let mut rewards = Vec::with_capacity(eligible.len());
        let mut total_distributed = U256::zero();
        for (c, m) in eligible {
            let reward = if sum == 0 {
                U256::zero()
            } else {
                pool * U256::from(m) / U256::from(sum)
            };
            total_distributed += reward;
            rewards.push(CandidateReward {
                producer: c.producer,
                block_hash: c.hash(),
                rank: c.rank,
                new_tx_count: c.new_tx_count,
                final_multiplier_bps: m,
                reward,
            });
        }
        RewardDistribution {
            rewards,
            residual: pool.saturating_sub(total_distributed),
            total_distributed,
        }
    }

    /// Upper estimate for a single candidate at `rank`, as if it were alone
    /// with rank 1's share as the reference. Never exceeds the pool.
    pub fn estimate_reward(&self, candidate: &BlockCandidate, pool: U256, rank: usize) -> U256 {
        let mut probe = candidate.clone();
        probe.rank = rank;
        probe.quality = self.scorer.score(&probe.block);
        let m = self.final_multiplier_bps(&probe);
        let reference = self
            .config
            .speed_reward_ratios_bps
            .first()
            .copied()
            .unwrap_or(10_000)
            .max(1);
        (pool * U256::from(m) / U256::from(reference)).min(pool)
    }
}

/// Reject a distribution that overspends the pool or leaves more than 1%.
pub fn validate_reward_distribution(rewards: &[U256], pool: U256) -> ConsensusResult<()> {
    if rewards.is_empty() {
        return Err(ConsensusError::NoRewardData);
    }
    let total = rewards
        .iter()
        .try_fold(U256::zero(), |acc, r| acc.checked_add(*r))
        .ok_or_else(|| ConsensusError::InvalidReward("reward sum overflows".into()))?;
    if total > pool {
        return Err(ConsensusError::InvalidReward(format!(
            "distributed {} exceeds pool {}",
            total, pool
        )));
    }
    let shortfall = pool - total;
    if shortfall * U256::from(10_000u64) > pool * U256::from(MAX_SHORTFALL_BPS) {
        return Err(ConsensusError::InvalidReward(format!(
            "distributed {} deviates from pool {} by more than 1%",
            total, pool
        )));
    }
    Ok(())
}
