//! Uptime aggregation from four signals: heartbeats, peer observations,
//! transaction participation and response latency.
//!
//! Every sub-score is in `[0, 10_000]`; the composite is the configured
//! weighted sum. Each signal lives in its own table behind its own lock.

use crate::config::UptimeConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::collections::{HashMap, HashSet, VecDeque};

const MAX_SCORE: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub first_seen: u64,
    pub last_seen: u64,
    pub total: u64,
    pub missed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxParticipation {
    pub processed_txs: u64,
    pub processed_gas: u64,
    pub blocks: u64,
}

/// Network-wide totals the participation score is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkTotals {
    pub total_txs: u64,
    pub total_gas: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseStats {
    pub samples: usize,
    pub mean_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UptimeSnapshot {
    pub address: Address,
    pub heartbeat_score: u64,
    pub consensus_score: u64,
    pub tx_participation_score: u64,
    pub response_score: u64,
    pub composite_score: u64,
    pub timestamp: u64,
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1]
}

fn ratio_score(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    ((u128::from(part) * u128::from(MAX_SCORE) / u128::from(whole)) as u64).min(MAX_SCORE)
}

pub struct UptimeAggregator {
    config: UptimeConfig,
    heartbeats: RwLock<HashMap<Address, HeartbeatRecord>>,
    /// observed → observer → last seen.
    observations: RwLock<HashMap<Address, HashMap<Address, u64>>>,
    participation: RwLock<HashMap<Address, TxParticipation>>,
    responses: RwLock<HashMap<Address, VecDeque<u64>>>,
}

impl UptimeAggregator {
    pub fn new(config: UptimeConfig) -> Self {
        Self {
            config,
            heartbeats: RwLock::new(HashMap::new()),
            observations: RwLock::new(HashMap::new()),
            participation: RwLock::new(HashMap::new()),
            responses: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &UptimeConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Heartbeats
    // -------------------------------------------------------------------------

    pub fn record_heartbeat(&self, address: Address, now: u64) {
        let interval = self.config.heartbeat_interval_secs.max(1);
        let mut table = self.heartbeats.write();
        let record = table.entry(address).or_insert(HeartbeatRecord {
            first_seen: now,
            last_seen: now,
            total: 0,
            missed: 0,
        });
        let gap = now.saturating_sub(record.last_seen);
        if gap > interval {
            record.missed += gap / interval - 1;
        }
        record.last_seen = record.last_seen.max(now);
        record.total += 1;
    }

    pub fn heartbeat(&self, address: &Address) -> Option<HeartbeatRecord> {
        self.heartbeats.read().get(address).copied()
    }

    /// `10000 * min(1, received / expected)`, expected over the time since
    /// the first heartbeat.
    pub fn heartbeat_score(&self, address: &Address, now: u64) -> u64 {
        let Some(record) = self.heartbeat(address) else {
            return 0;
        };
        let expected = now.saturating_sub(record.first_seen) / self.config.heartbeat_interval_secs.max(1);
        if expected == 0 {
            return MAX_SCORE;
        }
        ratio_score(record.total, expected)
    }

    // -------------------------------------------------------------------------
    // Peer observations
    // -------------------------------------------------------------------------

    pub fn record_observation(&self, observer: Address, observed: Address, now: u64) {
        let mut table = self.observations.write();
        let seen = table.entry(observed).or_default().entry(observer).or_insert(now);
        *seen = (*seen).max(now);
    }

    fn observer_count(table: &HashMap<Address, HashMap<Address, u64>>) -> usize {
        table
            .values()
            .flat_map(|observers| observers.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Share of all known observers that saw `address` within the window.
    pub fn consensus_score(&self, address: &Address, now: u64) -> u64 {
        let table = self.observations.read();
        let total = Self::observer_count(&table) as u64;
        let recent = table
            .get(address)
            .map(|observers| {
                observers
                    .values()
                    .filter(|ts| now.saturating_sub(**ts) <= self.config.observation_window_secs)
                    .count() as u64
            })
            .unwrap_or(0);
        ratio_score(recent, total)
    }

    pub fn has_consensus(&self, address: &Address, now: u64) -> bool {
        self.consensus_score(address, now) >= self.config.consensus_threshold_bps
    }

    // -------------------------------------------------------------------------
    // Transaction participation
    // -------------------------------------------------------------------------

    pub fn record_block_participation(&self, address: Address, txs: u64, gas: u64) {
        let mut table = self.participation.write();
        let record = table.entry(address).or_default();
        record.processed_txs += txs;
        record.processed_gas += gas;
        record.blocks += 1;
    }

    pub fn participation(&self, address: &Address) -> TxParticipation {
        self.participation.read().get(address).copied().unwrap_or_default()
    }

    pub fn tx_participation_score(&self, address: &Address, totals: NetworkTotals) -> u64 {
        let p = self.participation(address);
        ratio_score(p.processed_txs, totals.total_txs) / 2 + ratio_score(p.processed_gas, totals.total_gas) / 2
    }

    // -------------------------------------------------------------------------
    // Response latency
    // -------------------------------------------------------------------------

    pub fn record_response(&self, address: Address, latency_ms: u64) {
        let mut table = self.responses.write();
        let ring = table.entry(address).or_default();
        if ring.len() == self.config.max_response_samples {
            ring.pop_front();
        }
        ring.push_back(latency_ms);
    }

    pub fn response_stats(&self, address: &Address) -> ResponseStats {
        let Some(mut sorted) = self
            .responses
            .read()
            .get(address)
            .map(|ring| ring.iter().copied().collect::<Vec<_>>())
        else {
            return ResponseStats::default();
        };
        if sorted.is_empty() {
            return ResponseStats::default();
        }
        sorted.sort_unstable();
        ResponseStats {
            samples: sorted.len(),
            mean_ms: sorted.iter().sum::<u64>() / sorted.len() as u64,
            p50_ms: percentile(&sorted, 50),
            p95_ms: percentile(&sorted, 95),
            p99_ms: percentile(&sorted, 99),
        }
    }

    /// Full score at or under the target p95, then `target / p95`.
    /// No samples scores zero.
    pub fn response_score(&self, address: &Address) -> u64 {
        let stats = self.response_stats(address);
        if stats.samples == 0 {
            return 0;
        }
        if stats.p95_ms <= self.config.response_target_ms {
            return MAX_SCORE;
        }
        ratio_score(self.config.response_target_ms, stats.p95_ms)
    }

    // -------------------------------------------------------------------------
    // Composite
    // -------------------------------------------------------------------------

    pub fn snapshot(&self, address: Address, now: u64, totals: NetworkTotals) -> UptimeSnapshot {
        let heartbeat_score = self.heartbeat_score(&address, now);
        let consensus_score = self.consensus_score(&address, now);
        let tx_participation_score = self.tx_participation_score(&address, totals);
        let response_score = self.response_score(&address);
        let c = &self.config;
        let composite_score = ((heartbeat_score * c.heartbeat_weight
            + consensus_score * c.consensus_weight
            + tx_participation_score * c.tx_participation_weight
            + response_score * c.response_weight)
            / 100)
            .min(MAX_SCORE);
        UptimeSnapshot {
            address,
            heartbeat_score,
            consensus_score,
            tx_participation_score,
            response_score,
            composite_score,
            timestamp: now,
        }
    }

    /// Every address any signal has seen.
    pub fn known_addresses(&self) -> Vec<Address> {
        let mut all: HashSet<Address> = self.heartbeats.read().keys().copied().collect();
        all.extend(self.observations.read().keys().copied());
        all.extend(self.participation.read().keys().copied());
        all.extend(self.responses.read().keys().copied());
        let mut out: Vec<_> = all.into_iter().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: Address = [7u8; 20];

    fn aggregator() -> UptimeAggregator {
        UptimeAggregator::new(UptimeConfig::default())
    }

    #[test]
    fn test_heartbeat_score() {
        let agg = aggregator();
        assert_eq!(agg.heartbeat_score(&NODE, 0), 0);
        for i in 0..5 {
            agg.record_heartbeat(NODE, 1_000 + i * 30);
        }
        // 5 received over 300 s → 10 expected.
        assert_eq!(agg.heartbeat_score(&NODE, 1_300), 5_000);
        assert_eq!(agg.heartbeat_score(&NODE, 1_010), MAX_SCORE);
    }

    #[test]
    fn test_missed_heartbeats_counted() {
        let agg = aggregator();
        agg.record_heartbeat(NODE, 0);
        agg.record_heartbeat(NODE, 120);
        assert_eq!(agg.heartbeat(&NODE).unwrap().missed, 3);
    }

    #[test]
    fn test_consensus_score_window() {
        let agg = aggregator();
        let other = [8u8; 20];
        for observer in 1..=4u8 {
            agg.record_observation([observer; 20], other, 0);
        }
        agg.record_observation([1; 20], NODE, 1_000);
        agg.record_observation([2; 20], NODE, 1_000);
        agg.record_observation([3; 20], NODE, 500);
        assert_eq!(agg.consensus_score(&NODE, 1_100), 5_000);
        assert!(!agg.has_consensus(&NODE, 1_100));
        agg.record_observation([3; 20], NODE, 1_050);
        assert_eq!(agg.consensus_score(&NODE, 1_100), 7_500);
        assert!(agg.has_consensus(&NODE, 1_100));
    }

    #[test]
    fn test_tx_participation() {
        let agg = aggregator();
        agg.record_block_participation(NODE, 50, 1_000_000);
        let totals = NetworkTotals {
            total_txs: 100,
            total_gas: 1_000_000,
        };
        assert_eq!(agg.tx_participation_score(&NODE, totals), 7_500);
        assert_eq!(agg.tx_participation_score(&NODE, NetworkTotals::default()), 0);
        assert_eq!(agg.participation(&NODE).blocks, 1);
    }

    #[test]
    fn test_response_percentiles() {
        let agg = aggregator();
        for ms in 1..=100 {
            agg.record_response(NODE, ms * 10);
        }
        let stats = agg.response_stats(&NODE);
        assert_eq!(stats.samples, 100);
        assert_eq!(stats.p50_ms, 500);
        assert_eq!(stats.p95_ms, 950);
        assert_eq!(stats.p99_ms, 990);
        assert_eq!(agg.response_score(&NODE), MAX_SCORE);

        agg.record_response(NODE, 5_000);
        assert_eq!(agg.response_stats(&NODE).samples, 100);
    }

    #[test]
    fn test_slow_responses_penalised() {
        let agg = aggregator();
        for _ in 0..10 {
            agg.record_response(NODE, 2_000);
        }
        assert_eq!(agg.response_score(&NODE), 5_000);
        assert_eq!(agg.response_score(&[9; 20]), 0);
    }

    #[test]
    fn test_snapshot_composite() {
        let agg = aggregator();
        agg.record_heartbeat(NODE, 100);
        agg.record_response(NODE, 100);
        let snap = agg.snapshot(NODE, 110, NetworkTotals::default());
        assert_eq!(snap.heartbeat_score, MAX_SCORE);
        assert_eq!(snap.response_score, MAX_SCORE);
        assert_eq!(snap.composite_score, 5_000);
        assert_eq!(agg.known_addresses(), vec![NODE]);
    }
}
