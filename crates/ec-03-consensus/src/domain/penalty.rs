//! Penalty records and exclusion.
//!
//! A node reaching `penalty_threshold` penalties is excluded until
//! `last_penalty + exclusion_period`. Producers are additionally tracked
//! for streaks of empty and low-quality blocks.

use crate::config::PenaltyConfig;
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Address, U256};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    InvalidBlock,
    EmptyBlock,
    LowQuality,
    Offline,
    Misbehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    pub kind: PenaltyKind,
    pub amount: U256,
    pub timestamp: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
struct PenaltyTable {
    records: HashMap<Address, Vec<PenaltyRecord>>,
    excluded_until: HashMap<Address, u64>,
}

pub struct PenaltyManager {
    config: PenaltyConfig,
    table: RwLock<PenaltyTable>,
}

impl PenaltyManager {
    pub fn new(config: PenaltyConfig) -> Self {
        Self {
            config,
            table: RwLock::new(PenaltyTable::default()),
        }
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    /// Append a penalty. Returns the exclusion end if this penalty triggered one.
    pub fn record_penalty(
        &self,
        address: Address,
        kind: PenaltyKind,
        amount: U256,
        reason: impl Into<String>,
        now: u64,
    ) -> Option<u64> {
        let reason = reason.into();
        let mut table = self.table.write();
        let list = table.records.entry(address).or_default();
        list.push(PenaltyRecord {
            kind,
            amount,
            timestamp: now,
            reason: reason.clone(),
        });
        let count = list.len();
        warn!(
            "[ec-03] penalty recorded producer=0x{} kind={:?} count={} reason={}",
            hex::encode(address),
            kind,
            count,
            reason
        );
        if count >= self.config.penalty_threshold {
            let until = now.saturating_add(self.config.exclusion_period_secs);
            table.excluded_until.insert(address, until);
            return Some(until);
        }
        None
    }

    /// Exclude outright, independent of the penalty count.
    pub fn exclude(&self, address: Address, now: u64) -> u64 {
        let until = now.saturating_add(self.config.exclusion_period_secs);
        self.table.write().excluded_until.insert(address, until);
        until
    }

    pub fn is_excluded(&self, address: &Address, now: u64) -> bool {
        self.exclusion_end(address).is_some_and(|until| now < until)
    }

    pub fn exclusion_end(&self, address: &Address) -> Option<u64> {
        self.table.read().excluded_until.get(address).copied()
    }

    pub fn check_not_excluded(&self, address: &Address, now: u64) -> ConsensusResult<()> {
        match self.exclusion_end(address) {
            Some(until) if now < until => Err(ConsensusError::NodeExcluded {
                address: *address,
                until,
            }),
            _ => Ok(()),
        }
    }

    pub fn penalty_count(&self, address: &Address) -> usize {
        self.table.read().records.get(address).map_or(0, Vec::len)
    }

    pub fn penalties(&self, address: &Address) -> Vec<PenaltyRecord> {
        self.table.read().records.get(address).cloned().unwrap_or_default()
    }
}

/// What the tracker concluded from one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerVerdict {
    None,
    Penalize(PenaltyKind),
    Exclude,
}

#[derive(Debug, Clone, Copy, Default)]
struct Streaks {
    empty: u32,
    low_quality: u32,
}

/// Streaks of empty and low-quality blocks per producer.
pub struct ProducerPenaltyTracker {
    config: PenaltyConfig,
    streaks: RwLock<HashMap<Address, Streaks>>,
}

impl ProducerPenaltyTracker {
    pub fn new(config: PenaltyConfig) -> Self {
        Self {
            config,
            streaks: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_block(&self, producer: Address, tx_count: usize, quality_score: u64) -> ProducerVerdict {
        let mut streaks = self.streaks.write();
        let s = streaks.entry(producer).or_default();
        if tx_count == 0 {
            s.empty += 1;
            if s.empty >= self.config.empty_block_threshold {
                s.empty = 0;
                return ProducerVerdict::Exclude;
            }
            return ProducerVerdict::Penalize(PenaltyKind::EmptyBlock);
        }
        s.empty = 0;
        if quality_score < self.config.low_quality_threshold {
            s.low_quality += 1;
            if s.low_quality >= self.config.low_quality_streak {
                s.low_quality = 0;
                return ProducerVerdict::Penalize(PenaltyKind::LowQuality);
            }
            return ProducerVerdict::None;
        }
        s.low_quality = 0;
        ProducerVerdict::None
    }

    pub fn empty_streak(&self, producer: &Address) -> u32 {
        self.streaks.read().get(producer).map_or(0, |s| s.empty)
    }

    pub fn low_quality_streak(&self, producer: &Address) -> u32 {
        self.streaks.read().get(producer).map_or(0, |s| s.low_quality)
    }
}
