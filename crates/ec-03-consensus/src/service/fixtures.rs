//! Shared harness for service tests.

use super::engine::ConsensusEngine;
use super::rpc::ConsensusRpc;
use crate::adapters::{InMemoryChain, InMemoryState, ManualClock};
use crate::config::ConsensusConfig;
use crate::ports::ChainReader;
use ec_01_attestation::{SoftwareAttestor, SoftwareQuoteVerifier, StaticMeasurementPolicy};
use shared_types::{Address, Block, BlockHeader, Measurement, Transaction, U256};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub(crate) const MR: Measurement = Measurement([0x42; 32]);
pub(crate) const GENESIS_SECS: u64 = 1_700_000_000;

pub(crate) type TestEngine = ConsensusEngine<SoftwareAttestor, SoftwareQuoteVerifier>;
pub(crate) type TestRpc = ConsensusRpc<SoftwareAttestor, SoftwareQuoteVerifier>;

pub(crate) struct Harness {
    pub engine: Arc<TestEngine>,
    pub chain: Arc<InMemoryChain>,
    pub state: InMemoryState,
    pub clock: Arc<ManualClock>,
    pub policy: Arc<StaticMeasurementPolicy>,
    pub genesis: Block,
}

pub(crate) fn genesis() -> Block {
    Block::new(
        BlockHeader {
            timestamp: GENESIS_SECS,
            difficulty: 1,
            gas_limit: 30_000_000,
            ..Default::default()
        },
        vec![],
    )
}

pub(crate) fn harness() -> Harness {
    harness_with(ConsensusConfig::default())
}

pub(crate) fn harness_with(config: ConsensusConfig) -> Harness {
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS + 10));
    let policy = Arc::new(StaticMeasurementPolicy::new([MR]));
    let engine = ConsensusEngine::new(
        config,
        Arc::new(SoftwareAttestor::random(MR)),
        Arc::new(SoftwareQuoteVerifier::new()),
        policy.clone(),
    )
    .unwrap()
    .with_time_source(clock.clone());
    let genesis = genesis();
    Harness {
        engine: Arc::new(engine),
        chain: Arc::new(InMemoryChain::with_genesis(genesis.clone())),
        state: InMemoryState::new(),
        clock,
        policy,
        genesis,
    }
}

pub(crate) fn transfer(from: Address, nonce: u64) -> Transaction {
    Transaction::new(
        from,
        Some([0xEE; 20]),
        U256::from(1u64),
        nonce,
        U256::from(1_000_000_000u64),
        21_000,
        vec![],
    )
}

impl Harness {
    /// Prepared and finalized, not yet sealed, on the current head.
    pub(crate) async fn assemble(&self, txs: Vec<Transaction>) -> Block {
        let head = self.chain.current_header().unwrap();
        self.clock.advance_millis(2_000);
        let mut header = BlockHeader {
            parent_hash: head.hash(),
            number: head.number + 1,
            gas_limit: 30_000_000,
            gas_used: 21_000 * txs.len() as u64,
            ..Default::default()
        };
        self.engine.prepare(self.chain.as_ref(), &mut header).await.unwrap();
        self.engine
            .finalize_and_assemble(&self.state, header, txs)
            .unwrap()
    }

    pub(crate) async fn seal(&self, block: Block) -> Block {
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop, stop_rx) = watch::channel(false);
        self.engine.seal(block, tx, stop_rx).await.unwrap();
        rx.recv().await.unwrap()
    }

    /// Sealed block on the current head. Not appended.
    pub(crate) async fn produce(&self, txs: Vec<Transaction>) -> Block {
        let block = self.assemble(txs).await;
        self.seal(block).await
    }
}
