//! Consensus configuration.
//!
//! Every group carries its defaults and deserializes with
//! `#[serde(default)]`, so a host can load a partial file. Ratios are basis
//! points (`10_000 = 100%`); weights are percentages summing to 100.

use crate::error::{ConsensusError, ConsensusResult};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Block production timing and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub min_block_interval_ms: u64,
    /// Heartbeat: a block is produced at least this often.
    pub max_block_interval_ms: u64,
    pub max_tx_per_block: usize,
    pub max_gas_per_block: u64,
    pub verify_timeout_ms: u64,
    /// Allowed clock skew for header timestamps.
    pub max_future_secs: u64,
    /// Maximum `|now - attestation_ts|`.
    pub max_attestation_age_secs: u64,
    /// Reject headers whose quote does not bind the parent hash.
    /// When false the mismatch is logged and accepted.
    pub enforce_user_data: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            min_block_interval_ms: 1_000,
            max_block_interval_ms: 60_000,
            max_tx_per_block: 1_000,
            max_gas_per_block: 30_000_000,
            verify_timeout_ms: 10_000,
            max_future_secs: 15,
            max_attestation_age_secs: 3_600,
            enforce_user_data: true,
        }
    }
}

/// On-demand production triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnDemandConfig {
    pub enabled: bool,
    pub min_tx_count: usize,
    pub min_gas_total: u64,
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_tx_count: 1,
            min_gas_total: 21_000,
        }
    }
}

/// Multi-producer candidate collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    pub candidate_window_ms: u64,
    pub max_candidates: usize,
    /// Share per rank in bps; non-increasing.
    pub speed_reward_ratios_bps: Vec<u64>,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            candidate_window_ms: 500,
            max_candidates: 3,
            speed_reward_ratios_bps: vec![10_000, 6_000, 3_000],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub tx_count_weight: u64,
    pub block_size_weight: u64,
    pub gas_utilization_weight: u64,
    pub tx_diversity_weight: u64,
    pub min_tx_threshold: u64,
    /// Bytes.
    pub target_block_size: u64,
    pub target_gas_utilization_bps: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            tx_count_weight: 40,
            block_size_weight: 20,
            gas_utilization_weight: 20,
            tx_diversity_weight: 20,
            min_tx_threshold: 5,
            target_block_size: 1_048_576,
            target_gas_utilization_bps: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UptimeConfig {
    pub heartbeat_interval_secs: u64,
    /// Peer observations older than this do not count.
    pub observation_window_secs: u64,
    pub consensus_threshold_bps: u64,
    pub response_target_ms: u64,
    pub max_response_samples: usize,
    pub heartbeat_weight: u64,
    pub consensus_weight: u64,
    pub tx_participation_weight: u64,
    pub response_weight: u64,
}

impl Default for UptimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            observation_window_secs: 300,
            consensus_threshold_bps: 6_700,
            response_target_ms: 1_000,
            max_response_samples: 100,
            heartbeat_weight: 30,
            consensus_weight: 30,
            tx_participation_weight: 20,
            response_weight: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub uptime_weight: u64,
    pub success_weight: u64,
    pub penalty_weight: u64,
    pub min_reputation: u64,
    /// Seconds between uptime → reputation roll-ups.
    pub update_interval_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            uptime_weight: 50,
            success_weight: 30,
            penalty_weight: 20,
            min_reputation: 3_000,
            update_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub penalty_threshold: usize,
    pub exclusion_period_secs: u64,
    /// Wei recorded against a producer per penalty.
    pub penalty_amount: U256,
    pub empty_block_threshold: u32,
    pub low_quality_threshold: u64,
    pub low_quality_streak: u32,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            penalty_threshold: 3,
            exclusion_period_secs: 3_600,
            penalty_amount: U256::exp10(17),
            empty_block_threshold: 3,
            low_quality_threshold: 2_000,
            low_quality_streak: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Wei.
    pub base_block_reward: U256,
    pub online_rate_bps: u64,
    pub quality_rate_bps: u64,
    pub service_rate_bps: u64,
    pub historical_rate_bps: u64,
    pub epoch_duration_secs: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_block_reward: U256::from(2u64) * U256::exp10(18),
            online_rate_bps: 1_000,
            quality_rate_bps: 2_000,
            service_rate_bps: 1_000,
            historical_rate_bps: 500,
            epoch_duration_secs: 86_400,
        }
    }
}

/// Consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConsensusConfig {
    pub basic: BasicConfig,
    pub on_demand: OnDemandConfig,
    pub candidates: CandidateConfig,
    pub quality: QualityConfig,
    pub uptime: UptimeConfig,
    pub reputation: ReputationConfig,
    pub penalty: PenaltyConfig,
    pub reward: RewardConfig,
}

fn weights_sum_to_100(group: &str, weights: &[u64]) -> ConsensusResult<()> {
    let sum: u64 = weights.iter().sum();
    if sum != 100 {
        return Err(ConsensusError::InvalidConfig(format!(
            "{group} weights sum to {sum}, expected 100"
        )));
    }
    Ok(())
}

fn at_most_bps(name: &str, value: u64) -> ConsensusResult<()> {
    if value > 10_000 {
        return Err(ConsensusError::InvalidConfig(format!(
            "{name} = {value} exceeds 10000 bps"
        )));
    }
    Ok(())
}

impl ConsensusConfig {
    /// Reject inconsistent settings.
    pub fn validate(&self) -> ConsensusResult<()> {
        let b = &self.basic;
        if b.min_block_interval_ms > b.max_block_interval_ms {
            return Err(ConsensusError::InvalidConfig(
                "min_block_interval_ms exceeds max_block_interval_ms".into(),
            ));
        }
        if b.max_tx_per_block == 0 || b.verify_timeout_ms == 0 {
            return Err(ConsensusError::InvalidConfig(
                "max_tx_per_block and verify_timeout_ms must be positive".into(),
            ));
        }

        let c = &self.candidates;
        if c.max_candidates == 0 || c.speed_reward_ratios_bps.is_empty() {
            return Err(ConsensusError::InvalidConfig(
                "candidate settings need at least one rank".into(),
            ));
        }
        if c.speed_reward_ratios_bps.windows(2).any(|w| w[1] > w[0]) {
            return Err(ConsensusError::InvalidConfig(
                "speed_reward_ratios_bps must be non-increasing".into(),
            ));
        }
        for ratio in &c.speed_reward_ratios_bps {
            at_most_bps("speed_reward_ratio", *ratio)?;
        }

        let q = &self.quality;
        weights_sum_to_100(
            "quality",
            &[
                q.tx_count_weight,
                q.block_size_weight,
                q.gas_utilization_weight,
                q.tx_diversity_weight,
            ],
        )?;
        if q.min_tx_threshold == 0 || q.target_block_size == 0 || q.target_gas_utilization_bps == 0 {
            return Err(ConsensusError::InvalidConfig(
                "quality targets must be positive".into(),
            ));
        }
        at_most_bps("target_gas_utilization_bps", q.target_gas_utilization_bps)?;

        let u = &self.uptime;
        weights_sum_to_100(
            "uptime",
            &[
                u.heartbeat_weight,
                u.consensus_weight,
                u.tx_participation_weight,
                u.response_weight,
            ],
        )?;
        if u.heartbeat_interval_secs == 0 || u.response_target_ms == 0 || u.max_response_samples == 0 {
            return Err(ConsensusError::InvalidConfig(
                "uptime intervals must be positive".into(),
            ));
        }
        at_most_bps("consensus_threshold_bps", u.consensus_threshold_bps)?;

        let r = &self.reputation;
        weights_sum_to_100("reputation", &[r.uptime_weight, r.success_weight, r.penalty_weight])?;
        at_most_bps("min_reputation", r.min_reputation)?;

        if self.penalty.penalty_threshold == 0 {
            return Err(ConsensusError::InvalidConfig(
                "penalty_threshold must be positive".into(),
            ));
        }
        at_most_bps("low_quality_threshold", self.penalty.low_quality_threshold)?;

        let rw = &self.reward;
        for (name, rate) in [
            ("online_rate_bps", rw.online_rate_bps),
            ("quality_rate_bps", rw.quality_rate_bps),
            ("service_rate_bps", rw.service_rate_bps),
            ("historical_rate_bps", rw.historical_rate_bps),
        ] {
            at_most_bps(name, rate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        ConsensusConfig::default().validate().unwrap();
    }

    #[test]
    fn test_weights_must_sum() {
        let mut config = ConsensusConfig::default();
        config.quality.tx_count_weight = 50;
        assert_eq!(config.validate().unwrap_err().kind(), "invalid_config");
    }

    #[test]
    fn test_intervals_ordered() {
        let mut config = ConsensusConfig::default();
        config.basic.min_block_interval_ms = 120_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_speed_ratios_non_increasing() {
        let mut config = ConsensusConfig::default();
        config.candidates.speed_reward_ratios_bps = vec![10_000, 12_000];
        assert!(config.validate().is_err());
        config.candidates.speed_reward_ratios_bps = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: ConsensusConfig =
            serde_json::from_str(r#"{"basic": {"min_block_interval_ms": 2000}}"#).unwrap();
        assert_eq!(config.basic.min_block_interval_ms, 2_000);
        assert_eq!(config.basic.max_block_interval_ms, 60_000);
        assert_eq!(config.candidates.max_candidates, 3);
    }
}
