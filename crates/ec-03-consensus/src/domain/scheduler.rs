//! On-demand block scheduling.
//!
//! ```text
//! elapsed >= max_interval            → produce (heartbeat)
//! elapsed <  min_interval            → wait
//! pending_tx  >= min_tx_count        → produce
//! pending_gas >= min_gas_total       → produce
//! otherwise                          → wait
//! ```

use crate::config::{BasicConfig, CandidateConfig, OnDemandConfig};
use crate::error::{ConsensusError, ConsensusResult};
use std::time::Duration;

/// Why the scheduler did or did not produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceDecision {
    Heartbeat,
    TxCount,
    GasTotal,
    /// On-demand disabled: fixed interval.
    Interval,
    TooSoon,
    Idle,
}

impl ProduceDecision {
    pub fn should_produce(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat | Self::TxCount | Self::GasTotal | Self::Interval
        )
    }
}

#[derive(Debug, Clone)]
pub struct OnDemandScheduler {
    basic: BasicConfig,
    on_demand: OnDemandConfig,
    candidates: CandidateConfig,
}

impl OnDemandScheduler {
    pub fn new(basic: BasicConfig, on_demand: OnDemandConfig, candidates: CandidateConfig) -> Self {
        Self {
            basic,
            on_demand,
            candidates,
        }
    }

    /// Decide from the milliseconds elapsed since the last block.
    pub fn decide(&self, elapsed_ms: u64, pending_tx_count: usize, pending_gas_total: u64) -> ProduceDecision {
        if elapsed_ms >= self.basic.max_block_interval_ms {
            return ProduceDecision::Heartbeat;
        }
        if elapsed_ms < self.basic.min_block_interval_ms {
            return ProduceDecision::TooSoon;
        }
        if !self.on_demand.enabled {
            return ProduceDecision::Interval;
        }
        if pending_tx_count >= self.on_demand.min_tx_count {
            return ProduceDecision::TxCount;
        }
        if pending_gas_total >= self.on_demand.min_gas_total {
            return ProduceDecision::GasTotal;
        }
        ProduceDecision::Idle
    }

    pub fn should_produce(&self, last_block_ms: u64, now_ms: u64, pending_tx_count: usize, pending_gas_total: u64) -> bool {
        self.decide(now_ms.saturating_sub(last_block_ms), pending_tx_count, pending_gas_total)
            .should_produce()
    }

    /// Time until the next block could be due: the minimum interval when work
    /// is pending, otherwise the heartbeat.
    pub fn time_until_next(&self, last_block_ms: u64, now_ms: u64, has_pending: bool) -> Duration {
        let elapsed = now_ms.saturating_sub(last_block_ms);
        let target = if has_pending {
            self.basic.min_block_interval_ms
        } else {
            self.basic.max_block_interval_ms
        };
        Duration::from_millis(target.saturating_sub(elapsed))
    }

    pub fn is_within_candidate_window(&self, first_candidate_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(first_candidate_ms) < self.candidates.candidate_window_ms
    }

    /// Production preconditions for a block about to be assembled.
    pub fn validate_production(&self, elapsed_ms: u64, tx_count: usize) -> ConsensusResult<()> {
        if elapsed_ms < self.basic.min_block_interval_ms {
            return Err(ConsensusError::BlockIntervalTooShort {
                elapsed_ms,
                min_ms: self.basic.min_block_interval_ms,
            });
        }
        if tx_count > self.basic.max_tx_per_block {
            return Err(ConsensusError::TooManyTransactions {
                count: tx_count,
                limit: self.basic.max_tx_per_block,
            });
        }
        let heartbeat = elapsed_ms >= self.basic.max_block_interval_ms;
        if tx_count == 0 && self.on_demand.enabled && !heartbeat {
            return Err(ConsensusError::NoTransactions);
        }
        Ok(())
    }
}
