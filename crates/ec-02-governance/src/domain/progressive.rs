//! Progressive permission tiers.
//!
//! A measurement starts at `Basic`. Sustained uptime over time promotes it
//! to `Standard`, then `Full`. Uptime samples are basis points.

use crate::config::ProgressiveConfig;
use crate::domain::whitelist::PermissionLevel;
use crate::error::{GovernanceError, GovernanceResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::Measurement;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveRecord {
    pub mr_enclave: Measurement,
    pub current_level: PermissionLevel,
    pub activated_at: u64,
    pub last_upgrade_at: u64,
    pub uptime_history: VecDeque<u64>,
}

impl ProgressiveRecord {
    /// Mean of the recorded samples, 0 when empty.
    pub fn mean_uptime_bps(&self) -> u64 {
        if self.uptime_history.is_empty() {
            return 0;
        }
        self.uptime_history.iter().sum::<u64>() / self.uptime_history.len() as u64
    }
}

pub struct ProgressivePermission {
    config: ProgressiveConfig,
    records: RwLock<HashMap<Measurement, ProgressiveRecord>>,
}

impl ProgressivePermission {
    pub fn new(config: ProgressiveConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Start tracking `mr`. Calling again has no effect.
    pub fn activate_node(&self, mr: Measurement, current_block: u64) {
        self.records
            .write()
            .entry(mr)
            .or_insert_with(|| ProgressiveRecord {
                mr_enclave: mr,
                current_level: PermissionLevel::Basic,
                activated_at: current_block,
                last_upgrade_at: current_block,
                uptime_history: VecDeque::new(),
            });
    }

    /// Record an uptime sample and promote if due. Returns the resulting level.
    pub fn check_upgrade(
        &self,
        mr: &Measurement,
        current_block: u64,
        uptime_bps: u64,
    ) -> GovernanceResult<PermissionLevel> {
        let mut records = self.records.write();
        let record = records.get_mut(mr).ok_or(GovernanceError::NodeNotFound)?;

        record.uptime_history.push_back(uptime_bps.min(10_000));
        while record.uptime_history.len() > self.config.max_history {
            record.uptime_history.pop_front();
        }
        let mean = record.mean_uptime_bps();
        let age = current_block.saturating_sub(record.activated_at);

        if record.current_level == PermissionLevel::Basic
            && age >= self.config.basic_duration_blocks
            && mean >= self.config.standard_threshold_bps
        {
            record.current_level = PermissionLevel::Standard;
            record.last_upgrade_at = current_block;
            info!(mr_enclave = %mr, mean_bps = mean, "[ec-02] promoted to standard");
        }
        if record.current_level == PermissionLevel::Standard
            && age >= self.config.basic_duration_blocks + self.config.standard_duration_blocks
            && mean >= self.config.full_threshold_bps
        {
            record.current_level = PermissionLevel::Full;
            record.last_upgrade_at = current_block;
            info!(mr_enclave = %mr, mean_bps = mean, "[ec-02] promoted to full");
        }
        Ok(record.current_level)
    }

    /// Demote to `Basic` and forget the uptime history.
    pub fn downgrade(&self, mr: &Measurement, reason: &str) -> GovernanceResult<()> {
        let mut records = self.records.write();
        let record = records.get_mut(mr).ok_or(GovernanceError::NodeNotFound)?;
        record.current_level = PermissionLevel::Basic;
        record.uptime_history.clear();
        warn!(mr_enclave = %mr, reason, "[ec-02] permission downgraded");
        Ok(())
    }

    pub fn get_level(&self, mr: &Measurement) -> Option<PermissionLevel> {
        self.records.read().get(mr).map(|r| r.current_level)
    }

    pub fn get_record(&self, mr: &Measurement) -> Option<ProgressiveRecord> {
        self.records.read().get(mr).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MR: Measurement = Measurement([3; 32]);

    fn manager() -> ProgressivePermission {
        ProgressivePermission::new(ProgressiveConfig {
            basic_duration_blocks: 100,
            standard_duration_blocks: 200,
            ..ProgressiveConfig::default()
        })
    }

    #[test]
    fn test_activate_idempotent() {
        let pm = manager();
        pm.activate_node(MR, 10);
        pm.check_upgrade(&MR, 11, 9_000).unwrap();
        pm.activate_node(MR, 50);
        let record = pm.get_record(&MR).unwrap();
        assert_eq!(record.activated_at, 10);
        assert_eq!(record.uptime_history.len(), 1);
    }

    #[test]
    fn test_promotion_schedule() {
        let pm = manager();
        pm.activate_node(MR, 1_000);

        assert_eq!(pm.check_upgrade(&MR, 1_099, 10_000).unwrap(), PermissionLevel::Basic);
        assert_eq!(pm.check_upgrade(&MR, 1_100, 10_000).unwrap(), PermissionLevel::Standard);
        assert_eq!(pm.check_upgrade(&MR, 1_299, 10_000).unwrap(), PermissionLevel::Standard);
        assert_eq!(pm.check_upgrade(&MR, 1_300, 10_000).unwrap(), PermissionLevel::Full);
    }

    #[test]
    fn test_low_uptime_blocks_promotion() {
        let pm = manager();
        pm.activate_node(MR, 0);
        assert_eq!(pm.check_upgrade(&MR, 500, 9_400).unwrap(), PermissionLevel::Basic);
        // mean (9400 + 9700) / 2 = 9550
        assert_eq!(pm.check_upgrade(&MR, 501, 9_700).unwrap(), PermissionLevel::Standard);
        assert_eq!(pm.check_upgrade(&MR, 502, 10_000).unwrap(), PermissionLevel::Standard);
    }

    #[test]
    fn test_downgrade_clears_history() {
        let pm = manager();
        pm.activate_node(MR, 0);
        pm.check_upgrade(&MR, 100, 10_000).unwrap();
        pm.downgrade(&MR, "missed heartbeats").unwrap();
        let record = pm.get_record(&MR).unwrap();
        assert_eq!(record.current_level, PermissionLevel::Basic);
        assert!(record.uptime_history.is_empty());
    }

    #[test]
    fn test_unknown_node() {
        let pm = manager();
        assert_eq!(
            pm.check_upgrade(&MR, 0, 10_000),
            Err(GovernanceError::NodeNotFound)
        );
    }

    #[test]
    fn test_history_bounded() {
        let pm = ProgressivePermission::new(ProgressiveConfig {
            max_history: 3,
            ..ProgressiveConfig::default()
        });
        pm.activate_node(MR, 0);
        for i in 0..10 {
            pm.check_upgrade(&MR, i, 5_000).unwrap();
        }
        assert_eq!(pm.get_record(&MR).unwrap().uptime_history.len(), 3);
    }
}
