//! Governance configuration.
//!
//! Durations are in blocks, ratios in percent or basis points
//! (`10_000 = 100%`). Every group deserializes with `#[serde(default)]` so a
//! host can load a partial file.

use crate::error::{GovernanceError, GovernanceResult};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::Measurement;

/// One ether in wei.
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// Two-chamber voting rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Blocks a proposal stays open (~7 days at 15 s).
    pub voting_period_blocks: u64,
    /// Blocks between close and earliest execution (~1 day).
    pub execution_delay_blocks: u64,
    /// Core chamber yes share required to pass.
    pub core_threshold_percent: u64,
    /// Community no share that vetoes.
    pub community_veto_percent: u64,
    pub emergency_core_threshold_percent: u64,
    pub emergency_veto_percent: u64,
    /// Core chamber turnout required for a valid tally.
    pub min_participation_percent: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            voting_period_blocks: 40_320,
            execution_delay_blocks: 5_760,
            core_threshold_percent: 67,
            community_veto_percent: 34,
            emergency_core_threshold_percent: 100,
            emergency_veto_percent: 17,
            min_participation_percent: 50,
        }
    }
}

/// Staking ledger parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    pub min_stake: U256,
    pub unstake_lock_blocks: u64,
    pub annual_reward_rate_bps: u64,
    pub slashing_rate_percent: u64,
    pub blocks_per_year: u64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            min_stake: ether(10_000),
            unstake_lock_blocks: 40_320,
            annual_reward_rate_bps: 500,
            slashing_rate_percent: 10,
            blocks_per_year: 2_102_400,
        }
    }
}

/// Progressive permission tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressiveConfig {
    pub basic_duration_blocks: u64,
    pub standard_duration_blocks: u64,
    pub standard_threshold_bps: u64,
    pub full_threshold_bps: u64,
    /// Uptime samples kept per measurement.
    pub max_history: usize,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            basic_duration_blocks: 40_320,
            standard_duration_blocks: 80_640,
            standard_threshold_bps: 9_500,
            full_threshold_bps: 9_900,
            max_history: 1_000,
        }
    }
}

/// Founder registration window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub allowed_mr: Measurement,
    pub max_founders: u32,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            allowed_mr: Measurement::default(),
            max_founders: 5,
        }
    }
}

/// Upgrade-mode parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Blocks after a normal upgrade executes before it counts as complete.
    pub upgrade_window_blocks: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            upgrade_window_blocks: 5_760,
        }
    }
}

/// Governance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub voting: VotingConfig,
    pub staking: StakingConfig,
    pub progressive: ProgressiveConfig,
    pub bootstrap: BootstrapConfig,
    pub upgrade: UpgradeConfig,
    /// Seconds between whitelist sync passes.
    pub sync_interval_secs: u64,
    /// Quote verification deadline for admission and bootstrap.
    pub verify_timeout_ms: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting: VotingConfig::default(),
            staking: StakingConfig::default(),
            progressive: ProgressiveConfig::default(),
            bootstrap: BootstrapConfig::default(),
            upgrade: UpgradeConfig::default(),
            sync_interval_secs: 60,
            verify_timeout_ms: 10_000,
        }
    }
}

impl GovernanceConfig {
    /// Reject inconsistent settings.
    pub fn validate(&self) -> GovernanceResult<()> {
        let invalid = |msg: &str| Err(GovernanceError::InvalidConfig(msg.to_string()));
        let v = &self.voting;
        if v.voting_period_blocks == 0 {
            return invalid("voting_period_blocks must be positive");
        }
        for pct in [
            v.core_threshold_percent,
            v.community_veto_percent,
            v.emergency_core_threshold_percent,
            v.emergency_veto_percent,
            v.min_participation_percent,
        ] {
            if pct > 100 {
                return invalid("voting percentages must be <= 100");
            }
        }
        if v.emergency_core_threshold_percent < v.core_threshold_percent {
            return invalid("emergency core threshold must not be below the normal threshold");
        }
        if self.staking.slashing_rate_percent > 100 {
            return invalid("slashing_rate_percent must be <= 100");
        }
        if self.staking.blocks_per_year == 0 {
            return invalid("blocks_per_year must be positive");
        }
        let p = &self.progressive;
        if p.standard_threshold_bps > 10_000 || p.full_threshold_bps > 10_000 {
            return invalid("progressive thresholds must be <= 10000 bps");
        }
        if p.max_history == 0 {
            return invalid("max_history must be positive");
        }
        if self.bootstrap.max_founders == 0 {
            return invalid("max_founders must be positive");
        }
        Ok(())
    }
}
