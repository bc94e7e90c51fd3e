//! The consensus engine.
//!
//! Implements the host's pluggable-engine contract:
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `author` | `keccak(producer_id)[0..20]` |
//! | `verify_header(s)` | twelve ordered checks, batch is cancellable |
//! | `verify_uncles` | any uncle is invalid |
//! | `prepare` | difficulty 1, fresh quote bound to the parent hash |
//! | `finalize` | base reward + fees + quality bonus to the producer |
//! | `seal` | in-enclave signature over the seal hash, cancellable |
//! | `calc_difficulty` | always 1 |
//!
//! The engine owns every scoring table (quality, candidates, uptime,
//! reputation, penalties, rewards) exclusively. The RPC surface reads them
//! through a shared handle.

use super::rpc::ConsensusRpc;
use super::tasks::wait_for_stop;
use super::verifier::HeaderVerifier;
use crate::config::ConsensusConfig;
use crate::domain::extra::{decode_header_extra, seal_hash, ExtraData};
use crate::domain::{
    quality_bonus, validate_reward_distribution, BlockCandidate, CandidateCollector,
    MultiProducerRewards, NetworkTotals, OnDemandScheduler, PenaltyKind, PenaltyManager,
    ProducerPenaltyTracker, ProducerVerdict, QualityScore, QualityScorer, ReputationManager,
    RewardDistribution, RewardEngine, SubmitOutcome, UptimeAggregator,
};
use crate::error::{ConsensusError, ConsensusResult};
use crate::metrics;
use crate::ports::{BalanceChangeReason, ChainReader, NetworkStats, StateMutator, SystemTimeSource, TimeSource};
use ec_01_attestation::{Attestor, MeasurementPolicy, QuoteVerifier, ReportData};
use enclave_telemetry::{log_block_event, SUBSYSTEM_CONSENSUS};
use serde::{Deserialize, Serialize};
use shared_types::{keccak256, Address, Block, BlockHeader, Hash, Transaction, U256};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Difficulty of every block.
pub const DIFFICULTY: u64 = 1;

/// What `finalize` credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub producer: Address,
    pub base_reward: U256,
    pub fees: U256,
    pub quality_bonus: U256,
    pub total: U256,
    pub quality: QualityScore,
}

pub struct ConsensusEngine<A: Attestor, V: QuoteVerifier> {
    config: ConsensusConfig,
    attestor: Arc<A>,
    verifier: Arc<HeaderVerifier<V>>,
    policy: Arc<dyn MeasurementPolicy>,
    clock: Arc<dyn TimeSource>,
    scheduler: OnDemandScheduler,
    scorer: QualityScorer,
    candidates: CandidateCollector,
    multi_producer: MultiProducerRewards,
    uptime: Arc<UptimeAggregator>,
    reputation: Arc<ReputationManager>,
    penalties: Arc<PenaltyManager>,
    producer_penalties: ProducerPenaltyTracker,
    rewards: RewardEngine,
    closed: watch::Sender<bool>,
}

impl<A, V> ConsensusEngine<A, V>
where
    A: Attestor + 'static,
    V: QuoteVerifier + 'static,
{
    /// Build an engine on the system clock. Fails on an invalid config.
    pub fn new(
        config: ConsensusConfig,
        attestor: Arc<A>,
        quote_verifier: Arc<V>,
        policy: Arc<dyn MeasurementPolicy>,
    ) -> ConsensusResult<Self> {
        config.validate()?;
        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let verifier = Arc::new(HeaderVerifier::new(
            config.basic.clone(),
            quote_verifier,
            policy.clone(),
            clock.clone(),
        ));
        let scorer = QualityScorer::new(config.quality.clone());
        let (closed, _) = watch::channel(false);
        info!(
            producer = %hex::encode(attestor.producer_id()),
            mr_enclave = %attestor.measurement(),
            "[ec-03] consensus engine created"
        );
        Ok(Self {
            scheduler: OnDemandScheduler::new(
                config.basic.clone(),
                config.on_demand.clone(),
                config.candidates.clone(),
            ),
            candidates: CandidateCollector::new(&config.candidates),
            multi_producer: MultiProducerRewards::new(config.candidates.clone(), scorer.clone()),
            scorer,
            uptime: Arc::new(UptimeAggregator::new(config.uptime.clone())),
            reputation: Arc::new(ReputationManager::new(config.reputation.clone())),
            penalties: Arc::new(PenaltyManager::new(config.penalty.clone())),
            producer_penalties: ProducerPenaltyTracker::new(config.penalty.clone()),
            rewards: RewardEngine::new(config.reward.clone()),
            attestor,
            verifier,
            policy,
            clock,
            closed,
            config,
        })
    }

    /// Replace the clock (tests and simulations).
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.verifier = Arc::new(HeaderVerifier::new(
            self.config.basic.clone(),
            self.verifier.quote_verifier().clone(),
            self.policy.clone(),
            clock.clone(),
        ));
        self.clock = clock;
        self
    }

    fn ensure_open(&self) -> ConsensusResult<()> {
        if *self.closed.borrow() {
            return Err(ConsensusError::Stopped);
        }
        Ok(())
    }

    // =========================================================================
    // Host contract
    // =========================================================================

    /// Address credited with the block: `keccak(producer_id)[0..20]`.
    pub fn author(&self, header: &BlockHeader) -> ConsensusResult<Address> {
        let extra = ExtraData::decode(&header.extra_data)?;
        let digest = keccak256(&extra.producer_id);
        let mut author = [0u8; 20];
        author.copy_from_slice(&digest[..20]);
        Ok(author)
    }

    pub async fn verify_header(&self, chain: &dyn ChainReader, header: &BlockHeader) -> ConsensusResult<()> {
        self.verifier.verify(chain, header, None).await
    }

    /// Verify a batch on a background task. Results arrive in input order;
    /// setting the returned abort flag stops the task and discards whatever
    /// has not been sent.
    pub fn verify_headers(
        &self,
        chain: Arc<dyn ChainReader>,
        headers: Vec<BlockHeader>,
    ) -> (watch::Sender<bool>, mpsc::Receiver<ConsensusResult<()>>) {
        let (abort_tx, mut abort_rx) = watch::channel(false);
        let (results_tx, results_rx) = mpsc::channel(headers.len().max(1));
        let verifier = self.verifier.clone();

        tokio::spawn(async move {
            for (i, header) in headers.iter().enumerate() {
                let parent = i.checked_sub(1).map(|p| &headers[p]);
                let result = tokio::select! {
                    biased;
                    _ = wait_for_stop(&mut abort_rx) => {
                        debug!(remaining = headers.len() - i, "[ec-03] header batch aborted");
                        return;
                    }
                    result = verifier.verify(chain.as_ref(), header, parent) => result,
                };
                tokio::select! {
                    biased;
                    _ = wait_for_stop(&mut abort_rx) => return,
                    sent = results_tx.send(result) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        (abort_tx, results_rx)
    }

    /// Uncles are not part of the protocol.
    pub fn verify_uncles(&self, block: &Block) -> ConsensusResult<()> {
        if !block.uncles.is_empty() {
            return Err(ConsensusError::InvalidBlock(format!(
                "{} uncles present",
                block.uncles.len()
            )));
        }
        Ok(())
    }

    /// Fill in difficulty, time, coinbase and an unsigned attestation envelope.
    pub async fn prepare(&self, chain: &dyn ChainReader, header: &mut BlockHeader) -> ConsensusResult<()> {
        self.ensure_open()?;
        if header.number == 0 {
            return Err(ConsensusError::InvalidHeader("cannot prepare genesis".into()));
        }
        let parent = chain
            .header_by_hash(&header.parent_hash, header.number - 1)
            .ok_or(ConsensusError::UnknownAncestor(header.parent_hash))?;

        let now = self.clock.now_secs();
        let producer_id = self.attestor.producer_id();
        header.difficulty = DIFFICULTY;
        header.timestamp = now.max(parent.timestamp + 1);
        header.coinbase = producer_id;

        let report_data = ReportData::new(header.parent_hash, producer_id);
        let quote = self.attestor.generate_quote(&report_data.to_bytes()).await?;
        header.extra_data = ExtraData::new(quote, producer_id, now).encode();

        log_block_event!(debug, SUBSYSTEM_CONSENSUS, "[ec-03] header prepared", header.number, hex::encode(header.parent_hash));
        Ok(())
    }

    /// Credit `base + fees + quality_bonus` to the producer named in the extra.
    pub fn finalize(
        &self,
        state: &dyn StateMutator,
        header: &BlockHeader,
        transactions: &[Transaction],
    ) -> ConsensusResult<FinalizeSummary> {
        let extra = decode_header_extra(header)?;
        let quality = self
            .scorer
            .score(&Block::new(header.clone(), transactions.to_vec()));
        let base_reward = self.config.reward.base_block_reward;
        let fees = transactions
            .iter()
            .fold(U256::zero(), |acc, tx| acc.saturating_add(tx.fee()));
        let bonus = quality_bonus(base_reward, quality.reward_multiplier_bps);
        let total = base_reward.saturating_add(fees).saturating_add(bonus);

        state
            .add_balance(extra.producer_id, total, BalanceChangeReason::BlockReward)
            .map_err(ConsensusError::StateError)?;

        debug!(
            block_height = header.number,
            producer = %hex::encode(extra.producer_id),
            total = %total,
            quality = quality.total_score,
            "[ec-03] block finalized"
        );
        Ok(FinalizeSummary {
            producer: extra.producer_id,
            base_reward,
            fees,
            quality_bonus: bonus,
            total,
            quality,
        })
    }

    pub fn finalize_and_assemble(
        &self,
        state: &dyn StateMutator,
        header: BlockHeader,
        transactions: Vec<Transaction>,
    ) -> ConsensusResult<Block> {
        let limit = self.config.basic.max_tx_per_block;
        if transactions.len() > limit {
            return Err(ConsensusError::TooManyTransactions {
                count: transactions.len(),
                limit,
            });
        }
        self.finalize(state, &header, &transactions)?;
        Ok(Block::new(header, transactions))
    }

    /// Sign the seal hash in the enclave and emit the sealed block.
    ///
    /// A stop signal at either suspension point discards the block and
    /// returns `Ok`.
    pub async fn seal(
        &self,
        block: Block,
        results: mpsc::Sender<Block>,
        mut stop: watch::Receiver<bool>,
    ) -> ConsensusResult<()> {
        self.ensure_open()?;
        if block.number() == 0 {
            return Err(ConsensusError::InvalidBlock("cannot seal genesis".into()));
        }
        let mut extra = decode_header_extra(&block.header)?;
        let producer_id = self.attestor.producer_id();
        if extra.producer_id != producer_id {
            return Err(ConsensusError::InvalidProducerId {
                claimed: extra.producer_id,
                actual: producer_id,
            });
        }
        let hash = seal_hash(&block.header)?;

        let signature = tokio::select! {
            biased;
            _ = wait_for_stop(&mut stop) => {
                debug!(block_height = block.number(), "[ec-03] seal cancelled before signing");
                return Ok(());
            }
            signature = self.attestor.sign_in_enclave(&hash) => signature?,
        };

        extra.signature = signature.to_vec();
        let mut header = block.header.clone();
        header.extra_data = extra.encode();
        let sealed = block.with_seal(header);
        let number = sealed.number();
        let sealed_hash = sealed.hash();

        tokio::select! {
            biased;
            _ = wait_for_stop(&mut stop) => {
                debug!(block_height = number, "[ec-03] seal cancelled before delivery");
                Ok(())
            }
            sent = results.send(sealed) => {
                sent.map_err(|_| ConsensusError::Stopped)?;
                metrics::record_sealed(number);
                log_block_event!(info, SUBSYSTEM_CONSENSUS, "[ec-03] block sealed", number, hex::encode(sealed_hash));
                Ok(())
            }
        }
    }

    pub fn seal_hash(&self, header: &BlockHeader) -> ConsensusResult<Hash> {
        seal_hash(header)
    }

    pub fn calc_difficulty(&self, _parent: &BlockHeader) -> u64 {
        DIFFICULTY
    }

    /// Read-only API over the engine's tables.
    pub fn apis(self: &Arc<Self>, chain: Arc<dyn ChainReader>, stats: Arc<dyn NetworkStats>) -> ConsensusRpc<A, V> {
        ConsensusRpc::new(self.clone(), chain, stats)
    }

    /// Stop accepting prepare and seal requests. Idempotent.
    pub fn close(&self) -> ConsensusResult<()> {
        if !self.closed.send_replace(true) {
            info!("[ec-03] consensus engine closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Flips to `true` on [`close`](Self::close).
    pub fn subscribe_close(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    // =========================================================================
    // Multi-producer candidates
    // =========================================================================

    pub fn submit_candidate(&self, block: Block, received_at_ms: u64) -> ConsensusResult<SubmitOutcome> {
        let extra = decode_header_extra(&block.header)?;
        let quality = self.scorer.score(&block);
        let outcome = self.candidates.submit(BlockCandidate::new(
            block,
            received_at_ms,
            extra.producer_id,
            quality,
        ));
        if outcome == SubmitOutcome::WindowClosed {
            debug!(producer = %hex::encode(extra.producer_id), "[ec-03] candidate outside window dropped");
        }
        Ok(outcome)
    }

    /// Close the candidate set at `height`, split `pool` and credit producers.
    pub fn settle_candidates(
        &self,
        state: &dyn StateMutator,
        height: u64,
        pool: U256,
    ) -> ConsensusResult<RewardDistribution> {
        let candidates = self.candidates.take(height);
        if candidates.is_empty() {
            return Err(ConsensusError::NoRewardData);
        }
        let distribution = self.multi_producer.distribute(candidates, pool);
        let amounts: Vec<U256> = distribution.rewards.iter().map(|r| r.reward).collect();
        validate_reward_distribution(&amounts, pool)?;

        for reward in distribution.rewards.iter().filter(|r| !r.reward.is_zero()) {
            state
                .add_balance(reward.producer, reward.reward, BalanceChangeReason::CandidateReward)
                .map_err(ConsensusError::StateError)?;
        }
        self.candidates.prune_below(height);
        info!(
            block_height = height,
            candidates = distribution.rewards.len(),
            residual = %distribution.residual,
            "[ec-03] candidate rewards settled"
        );
        Ok(distribution)
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    /// Fold an imported block into participation, reward history, streak
    /// tracking and reputation. Penalties are logged, never returned.
    pub fn record_imported_block(&self, block: &Block) -> ConsensusResult<QualityScore> {
        let extra = decode_header_extra(&block.header)?;
        let producer = extra.producer_id;
        let now = self.clock.now_secs();
        let quality = self.scorer.score(block);

        self.uptime
            .record_block_participation(producer, block.tx_count() as u64, block.header.gas_used);
        self.rewards.record_block_produced(producer, now);
        self.reputation.record_block_result(producer, true, now);

        match self
            .producer_penalties
            .record_block(producer, block.tx_count(), quality.total_score)
        {
            ProducerVerdict::None => {}
            ProducerVerdict::Penalize(kind) => {
                self.penalties.record_penalty(
                    producer,
                    kind,
                    self.config.penalty.penalty_amount,
                    format!("block {} quality {}", block.number(), quality.total_score),
                    now,
                );
            }
            ProducerVerdict::Exclude => {
                let until = self.penalties.exclude(producer, now);
                warn!(
                    producer = %hex::encode(producer),
                    until,
                    "[ec-03] producer excluded after consecutive empty blocks"
                );
            }
        }
        self.reputation
            .set_penalty_count(producer, self.penalties.penalty_count(&producer) as u64, now);
        Ok(quality)
    }

    /// Record a block from `producer` that failed verification.
    pub fn report_invalid_block(&self, producer: Address, error: &ConsensusError) {
        let now = self.clock.now_secs();
        self.penalties.record_penalty(
            producer,
            PenaltyKind::InvalidBlock,
            self.config.penalty.penalty_amount,
            error.kind(),
            now,
        );
        self.reputation.record_block_result(producer, false, now);
        self.reputation
            .set_penalty_count(producer, self.penalties.penalty_count(&producer) as u64, now);
    }

    /// Push uptime composites into reputation for every known node.
    pub fn refresh_reputation(&self, totals: NetworkTotals) -> usize {
        let now = self.clock.now_secs();
        let addresses = self.uptime.known_addresses();
        for address in &addresses {
            let snapshot = self.uptime.snapshot(*address, now, totals);
            self.reputation.update_uptime(*address, snapshot.composite_score, now);
            self.reputation
                .set_penalty_count(*address, self.penalties.penalty_count(address) as u64, now);
        }
        addresses.len()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn attestor(&self) -> &Arc<A> {
        &self.attestor
    }

    pub fn producer_id(&self) -> Address {
        self.attestor.producer_id()
    }

    pub fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }

    pub fn scheduler(&self) -> &OnDemandScheduler {
        &self.scheduler
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    pub fn candidates(&self) -> &CandidateCollector {
        &self.candidates
    }

    pub fn uptime(&self) -> &Arc<UptimeAggregator> {
        &self.uptime
    }

    pub fn reputation(&self) -> &Arc<ReputationManager> {
        &self.reputation
    }

    pub fn penalties(&self) -> &Arc<PenaltyManager> {
        &self.penalties
    }

    pub fn rewards(&self) -> &RewardEngine {
        &self.rewards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChain;
    use crate::service::fixtures::{harness, transfer, GENESIS_SECS, MR};
    use shared_types::ZERO_HASH;

    #[tokio::test]
    async fn test_round_trip_verifies() {
        let h = harness();
        let block = h.produce(vec![transfer([1; 20], 0)]).await;

        h.engine.verify_header(h.chain.as_ref(), &block.header).await.unwrap();

        let producer = h.engine.producer_id();
        assert_eq!(block.header.coinbase, producer);
        assert_eq!(block.header.difficulty, 1);
        assert_eq!(h.engine.calc_difficulty(&h.genesis.header), 1);
        let author = h.engine.author(&block.header).unwrap();
        assert_eq!(&author[..], &keccak256(&producer)[..20]);
    }

    #[tokio::test]
    async fn test_prepare_binds_parent_hash() {
        let h = harness();
        let block = h.assemble(vec![]).await;
        let extra = decode_header_extra(&block.header).unwrap();
        let verifier = h.engine.verifier.quote_verifier();

        let rd = ReportData::from_bytes(&verifier.extract_report_data(&extra.quote).unwrap());
        assert_eq!(rd.binding, h.genesis.hash());
        assert_eq!(rd.producer, h.engine.producer_id());
        assert!(!extra.is_sealed());
        assert!(block.header.timestamp > GENESIS_SECS);
    }

    #[tokio::test]
    async fn test_prepare_unknown_parent() {
        let h = harness();
        let mut header = BlockHeader {
            parent_hash: [0xAB; 32],
            number: 5,
            ..Default::default()
        };
        let err = h.engine.prepare(h.chain.as_ref(), &mut header).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_ancestor");
    }

    #[tokio::test]
    async fn test_finalize_credits_reward_and_fees() {
        let h = harness();
        let txs = vec![transfer([1; 20], 0), transfer([2; 20], 0)];
        let block = h.assemble(txs.clone()).await;
        let before = h.state.balance(&h.engine.producer_id());

        let summary = h.engine.finalize(&h.state, &block.header, &txs).unwrap();

        let fees = txs[0].fee() + txs[1].fee();
        assert_eq!(summary.fees, fees);
        assert_eq!(
            summary.total,
            summary.base_reward + fees + summary.quality_bonus
        );
        assert_eq!(
            h.state.balance(&h.engine.producer_id()),
            before + summary.total
        );
    }

    #[tokio::test]
    async fn test_assemble_rejects_oversized_body() {
        let mut config = ConsensusConfig::default();
        config.basic.max_tx_per_block = 1;
        let h = crate::service::fixtures::harness_with(config);
        let head = h.chain.current_header().unwrap();
        let header = BlockHeader {
            parent_hash: head.hash(),
            number: 1,
            ..Default::default()
        };
        let err = h
            .engine
            .finalize_and_assemble(&h.state, header, vec![transfer([1; 20], 0), transfer([1; 20], 1)])
            .unwrap_err();
        assert_eq!(err.kind(), "too_many_transactions");
    }

    #[tokio::test]
    async fn test_seal_stopped_discards_block() {
        let h = harness();
        let block = h.assemble(vec![]).await;
        let (tx, mut rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();

        h.engine.seal(block, tx, stop_rx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_seal_rejects_genesis_and_closed() {
        let h = harness();
        let (tx, _rx) = mpsc::channel(1);
        let (_stop, stop_rx) = watch::channel(false);
        let err = h
            .engine
            .seal(h.genesis.clone(), tx, stop_rx.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_block");

        let block = h.assemble(vec![]).await;
        h.engine.close().unwrap();
        h.engine.close().unwrap();
        assert!(h.engine.is_closed());
        let (tx, _rx) = mpsc::channel(1);
        let err = h.engine.seal(block, tx, stop_rx).await.unwrap_err();
        assert_eq!(err.kind(), "stopped");

        let mut header = BlockHeader {
            parent_hash: h.genesis.hash(),
            number: 1,
            ..Default::default()
        };
        let err = h.engine.prepare(h.chain.as_ref(), &mut header).await.unwrap_err();
        assert_eq!(err.kind(), "stopped");
    }

    #[tokio::test]
    async fn test_verify_rejections() {
        let h = harness();
        let block = h.produce(vec![]).await;

        // Broken seal.
        let mut extra = decode_header_extra(&block.header).unwrap();
        extra.signature[10] ^= 0xFF;
        let mut header = block.header.clone();
        header.extra_data = extra.encode();
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_signature");

        // Claimed producer differs from the quote.
        let mut extra = decode_header_extra(&block.header).unwrap();
        extra.producer_id = [0x99; 20];
        let mut header = block.header.clone();
        header.extra_data = extra.encode();
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_producer_id");

        // Wrong difficulty.
        let mut header = block.header.clone();
        header.difficulty = 2;
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_difficulty");

        // Parent not in the chain.
        let mut header = block.header.clone();
        header.parent_hash = [0xAB; 32];
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_ancestor");

        // Not after the parent.
        let mut header = block.header.clone();
        header.timestamp = h.genesis.header.timestamp;
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_timestamp");

        // Extra below the length bound.
        let mut header = block.header.clone();
        header.extra_data = vec![0u8; 16];
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_extra");

        // Extra in range but not an envelope.
        let mut header = block.header.clone();
        header.extra_data = vec![0x01; 64];
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_extra");

        // Malformed quote.
        let mut extra = decode_header_extra(&block.header).unwrap();
        extra.quote[0] ^= 0xFF;
        let mut header = block.header.clone();
        header.extra_data = extra.encode();
        let err = h.engine.verify_header(h.chain.as_ref(), &header).await.unwrap_err();
        assert_eq!(err.kind(), "quote_verification_failed");

        // Revoked measurement.
        h.policy.revoke(&MR);
        let err = h
            .engine
            .verify_header(h.chain.as_ref(), &block.header)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MR_not_allowed");
    }

    #[tokio::test]
    async fn test_verify_time_windows() {
        let h = harness();
        let block = h.produce(vec![]).await;

        h.clock.set_secs(block.header.timestamp - 60);
        let err = h.engine.verify_header(h.chain.as_ref(), &block.header).await.unwrap_err();
        assert_eq!(err.kind(), "future_block");

        let max_age = h.engine.config().basic.max_attestation_age_secs;
        h.clock.set_secs(block.header.timestamp + max_age + 1);
        let err = h.engine.verify_header(h.chain.as_ref(), &block.header).await.unwrap_err();
        assert_eq!(err.kind(), "attestation_too_old");
    }

    #[tokio::test]
    async fn test_verify_quote_bound_elsewhere() {
        let h = harness();
        let mut block = h.assemble(vec![]).await;
        let producer = h.engine.producer_id();
        let quote = h
            .engine
            .attestor()
            .generate_quote(&ReportData::new([0xEE; 32], producer).to_bytes())
            .await
            .unwrap();
        block.header.extra_data = ExtraData::new(quote, producer, h.clock.now_secs()).encode();
        let sealed = h.seal(block).await;

        let err = h
            .engine
            .verify_header(h.chain.as_ref(), &sealed.header)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "quote_user_data_mismatch");
    }

    #[tokio::test]
    async fn test_verify_headers_batch_in_order() {
        let h = harness();
        let mut headers = Vec::new();
        for i in 0..3 {
            let block = h.produce(vec![transfer([3; 20], i)]).await;
            h.chain.append(block.clone());
            headers.push(block.header);
        }
        // Only genesis is known; parents come from the batch itself.
        let fresh: Arc<dyn ChainReader> = Arc::new(InMemoryChain::with_genesis(h.genesis.clone()));
        headers[2].difficulty = 7;

        let (_abort, mut results) = h.engine.verify_headers(fresh, headers);
        assert!(results.recv().await.unwrap().is_ok());
        assert!(results.recv().await.unwrap().is_ok());
        assert_eq!(results.recv().await.unwrap().unwrap_err().kind(), "invalid_difficulty");
        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_verify_headers_abort() {
        let h = harness();
        let block = h.produce(vec![]).await;
        let (abort, mut results) = h
            .engine
            .verify_headers(h.chain.clone(), vec![block.header.clone(), block.header]);
        abort.send(true).unwrap();
        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_uncles_rejected() {
        let h = harness();
        let mut block = h.produce(vec![]).await;
        h.engine.verify_uncles(&block).unwrap();
        block.uncles.push(BlockHeader::default());
        assert_eq!(h.engine.verify_uncles(&block).unwrap_err().kind(), "invalid_block");
    }

    #[tokio::test]
    async fn test_settle_candidates_credits_producers() {
        let h = harness();
        let a = h.produce(vec![transfer([1; 20], 0)]).await;
        let b = h.produce(vec![transfer([1; 20], 0), transfer([2; 20], 0)]).await;
        let pool = U256::from(1_000_000u64);

        assert_eq!(h.engine.submit_candidate(a.clone(), 1_000).unwrap(), SubmitOutcome::Accepted);
        assert_eq!(h.engine.submit_candidate(a, 1_100).unwrap(), SubmitOutcome::Duplicate);
        assert_eq!(h.engine.submit_candidate(b, 1_200).unwrap(), SubmitOutcome::Accepted);
        let before = h.state.balance(&h.engine.producer_id());

        let dist = h.engine.settle_candidates(&h.state, 1, pool).unwrap();

        assert_eq!(dist.total_distributed + dist.residual, pool);
        assert_eq!(
            h.state.balance(&h.engine.producer_id()),
            before + dist.total_distributed
        );
        assert_eq!(
            h.engine.settle_candidates(&h.state, 1, pool).unwrap_err().kind(),
            "no_reward_data"
        );
    }

    #[tokio::test]
    async fn test_empty_block_streak_excludes_producer() {
        let h = harness();
        let producer = h.engine.producer_id();
        for _ in 0..h.engine.config().penalty.empty_block_threshold {
            let block = h.produce(vec![]).await;
            h.chain.append(block.clone());
            h.engine.record_imported_block(&block).unwrap();
        }

        let now = h.clock.now_secs();
        assert!(h.engine.penalties().is_excluded(&producer, now));
        assert_eq!(h.engine.rewards().blocks_produced(&producer), 3);
        let record = h.engine.reputation().get(&producer).unwrap();
        assert_eq!(record.successful_blocks, 3);
        assert_eq!(record.penalty_count, 2);
    }

    #[tokio::test]
    async fn test_invalid_block_report_and_rollup() {
        let h = harness();
        let node = [5u8; 20];
        h.engine.uptime().record_heartbeat(node, h.clock.now_secs());
        h.engine
            .report_invalid_block(node, &ConsensusError::InvalidSignature("bad".into()));

        assert_eq!(h.engine.penalties().penalty_count(&node), 1);
        assert_eq!(h.engine.reputation().get(&node).unwrap().failed_blocks, 1);
        assert_eq!(h.engine.refresh_reputation(NetworkTotals::default()), 1);
        assert!(h.engine.reputation().get(&node).unwrap().uptime_score > 0);
    }

    #[test]
    fn test_seal_hash_ignores_signature() {
        let header = BlockHeader {
            parent_hash: ZERO_HASH,
            number: 1,
            extra_data: ExtraData::new(vec![0u8; 16], [1; 20], 10).encode(),
            ..Default::default()
        };
        let mut extra = ExtraData::decode(&header.extra_data).unwrap();
        extra.signature = vec![1u8; 65];
        let mut signed = header.clone();
        signed.extra_data = extra.encode();
        assert_eq!(seal_hash(&header).unwrap(), seal_hash(&signed).unwrap());
    }
}
