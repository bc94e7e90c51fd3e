//! Long-running tasks: on-demand production, sealed-block gossip and the
//! periodic reputation rollup.
//!
//! Every loop selects against a `watch::Receiver<bool>` stop flag and exits
//! when it flips to `true`.

use super::engine::ConsensusEngine;
use crate::domain::{OnDemandScheduler, PenaltyManager, ProduceDecision};
use crate::ports::{Broadcaster, ChainReader, Mempool, NetworkStats, TimeSource, WorkTrigger, WriteGate};
use ec_01_attestation::{Attestor, QuoteVerifier};
use enclave_telemetry::{log_event, SUBSYSTEM_CONSENSUS};
use parking_lot::Mutex;
use shared_types::{Address, Block, Hash};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Cadence of the production check.
pub const PRODUCE_TICK: Duration = Duration::from_millis(100);

/// Resolves once the flag reads `true`. A dropped sender never resolves.
pub async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Result of one production check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Work was requested on the current head.
    Triggered(ProduceDecision),
    /// Conditions not met yet.
    Waiting(ProduceDecision),
    /// Work for this head was already requested.
    AlreadyTriggered,
    /// Upgrade mode rejects writes.
    ReadOnly,
    /// The local producer is serving an exclusion.
    Excluded,
    /// The chain has no head.
    NoHead,
}

/// Decides when the host should build the next block.
pub struct BlockProducer {
    scheduler: OnDemandScheduler,
    chain: Arc<dyn ChainReader>,
    mempool: Arc<dyn Mempool>,
    trigger: Arc<dyn WorkTrigger>,
    gate: Arc<dyn WriteGate>,
    penalties: Arc<PenaltyManager>,
    clock: Arc<dyn TimeSource>,
    local: Address,
    last_triggered: Mutex<Option<Hash>>,
}

impl BlockProducer {
    pub fn new<A, V>(
        engine: &ConsensusEngine<A, V>,
        chain: Arc<dyn ChainReader>,
        mempool: Arc<dyn Mempool>,
        trigger: Arc<dyn WorkTrigger>,
        gate: Arc<dyn WriteGate>,
    ) -> Self
    where
        A: Attestor + 'static,
        V: QuoteVerifier + 'static,
    {
        Self {
            scheduler: engine.scheduler().clone(),
            penalties: engine.penalties().clone(),
            clock: engine.clock().clone(),
            local: engine.producer_id(),
            chain,
            mempool,
            trigger,
            gate,
            last_triggered: Mutex::new(None),
        }
    }

    /// Run one production check. Work is requested at most once per head.
    pub fn tick(&self) -> TickOutcome {
        let Some(head) = self.chain.current_header() else {
            return TickOutcome::NoHead;
        };
        let head_hash = head.hash();
        if *self.last_triggered.lock() == Some(head_hash) {
            return TickOutcome::AlreadyTriggered;
        }
        if self.gate.is_read_only() {
            return TickOutcome::ReadOnly;
        }
        let now_ms = self.clock.now_millis();
        if self.penalties.is_excluded(&self.local, now_ms / 1_000) {
            return TickOutcome::Excluded;
        }

        let (tx_count, gas_total) = if self.mempool.pending_count() == 0 {
            (0, 0)
        } else {
            let pending = self.mempool.pending(true);
            let gas = pending
                .values()
                .flatten()
                .fold(0u64, |acc, tx| acc.saturating_add(tx.gas_limit));
            (pending.values().map(Vec::len).sum(), gas)
        };
        let elapsed_ms = now_ms.saturating_sub(head.timestamp.saturating_mul(1_000));

        let decision = self.scheduler.decide(elapsed_ms, tx_count, gas_total);
        if !decision.should_produce() {
            return TickOutcome::Waiting(decision);
        }

        *self.last_triggered.lock() = Some(head_hash);
        self.trigger.trigger_work(&head);
        debug!(
            block_height = head.number + 1,
            ?decision,
            pending = tx_count,
            "[ec-03] block production triggered"
        );
        TickOutcome::Triggered(decision)
    }

    /// Tick every [`PRODUCE_TICK`] until stopped.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(PRODUCE_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log_event!(info, SUBSYSTEM_CONSENSUS, "[ec-03] block producer started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = wait_for_stop(&mut stop) => break,
            }
        }
        log_event!(info, SUBSYSTEM_CONSENSUS, "[ec-03] block producer stopped");
    }
}

/// Gossip sealed blocks until the channel closes or the stop flag is set.
pub async fn broadcast_sealed(
    mut sealed: mpsc::Receiver<Block>,
    broadcaster: Arc<dyn Broadcaster>,
    mut stop: watch::Receiver<bool>,
) -> usize {
    let mut sent = 0;
    loop {
        tokio::select! {
            block = sealed.recv() => {
                let Some(block) = block else { break };
                broadcaster.broadcast_block(&block, true).await;
                sent += 1;
            }
            _ = wait_for_stop(&mut stop) => break,
        }
    }
    debug!(sent, "[ec-03] sealed block gossip stopped");
    sent
}

/// Periodically fold uptime into reputation.
pub async fn reputation_rollup<A, V>(
    engine: Arc<ConsensusEngine<A, V>>,
    stats: Arc<dyn NetworkStats>,
    mut stop: watch::Receiver<bool>,
) where
    A: Attestor + 'static,
    V: QuoteVerifier + 'static,
{
    let period = Duration::from_secs(engine.config().reputation.update_interval_secs.max(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let updated = engine.refresh_reputation(stats.totals());
                if updated == 0 {
                    warn!("[ec-03] reputation rollup found no tracked nodes");
                } else {
                    debug!(updated, "[ec-03] reputation rollup");
                }
            }
            _ = wait_for_stop(&mut stop) => break,
        }
    }
}
