//! Per-height candidate collection.
//!
//! The window opens when the first candidate for a height arrives and stays
//! open for `candidate_window_ms`. Later arrivals are dropped.

use super::quality::QualityScore;
use crate::config::CandidateConfig;
use parking_lot::RwLock;
use shared_types::{Address, Block, Hash};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCandidate {
    pub block: Block,
    /// Wall-clock milliseconds.
    pub received_at_ms: u64,
    pub producer: Address,
    pub quality: QualityScore,
    /// 1-based; 0 until ranked.
    pub rank: usize,
    pub new_tx_count: usize,
}

impl BlockCandidate {
    pub fn new(block: Block, received_at_ms: u64, producer: Address, quality: QualityScore) -> Self {
        let new_tx_count = block.tx_count();
        Self {
            block,
            received_at_ms,
            producer,
            quality,
            rank: 0,
            new_tx_count,
        }
    }

    pub fn hash(&self) -> Hash {
        self.block.hash()
    }
}

#[derive(Debug, Clone, Default)]
struct CandidateSet {
    first_received_ms: u64,
    candidates: Vec<BlockCandidate>,
}

/// Outcome of [`CandidateCollector::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Duplicate,
    WindowClosed,
}

#[derive(Debug, Default)]
pub struct CandidateCollector {
    window_ms: u64,
    sets: RwLock<BTreeMap<u64, CandidateSet>>,
}

impl CandidateCollector {
    pub fn new(config: &CandidateConfig) -> Self {
        Self {
            window_ms: config.candidate_window_ms,
            sets: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn submit(&self, candidate: BlockCandidate) -> SubmitOutcome {
        let height = candidate.block.number();
        let mut sets = self.sets.write();
        let set = sets.entry(height).or_insert_with(|| CandidateSet {
            first_received_ms: candidate.received_at_ms,
            candidates: Vec::new(),
        });
        if candidate.received_at_ms.saturating_sub(set.first_received_ms) >= self.window_ms {
            return SubmitOutcome::WindowClosed;
        }
        let hash = candidate.hash();
        if set.candidates.iter().any(|c| c.hash() == hash) {
            return SubmitOutcome::Duplicate;
        }
        set.candidates.push(candidate);
        SubmitOutcome::Accepted
    }

    pub fn is_open(&self, height: u64, now_ms: u64) -> bool {
        self.sets
            .read()
            .get(&height)
            .map(|set| now_ms.saturating_sub(set.first_received_ms) < self.window_ms)
            .unwrap_or(true)
    }

    pub fn first_received(&self, height: u64) -> Option<u64> {
        self.sets.read().get(&height).map(|s| s.first_received_ms)
    }

    pub fn candidates(&self, height: u64) -> Vec<BlockCandidate> {
        self.sets
            .read()
            .get(&height)
            .map(|s| s.candidates.clone())
            .unwrap_or_default()
    }

    /// Remove and return the set for `height`.
    pub fn take(&self, height: u64) -> Vec<BlockCandidate> {
        self.sets
            .write()
            .remove(&height)
            .map(|s| s.candidates)
            .unwrap_or_default()
    }

    pub fn prune_below(&self, height: u64) {
        let mut sets = self.sets.write();
        *sets = sets.split_off(&height);
    }

    pub fn heights(&self) -> Vec<u64> {
        self.sets.read().keys().copied().collect()
    }
}
