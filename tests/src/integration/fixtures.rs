//! Builders shared by the integration flows.

use ec_01_attestation::{
    Attestor, MeasurementPolicy, ReportData, SoftwareAttestor, SoftwareQuoteVerifier,
    StaticMeasurementPolicy,
};
use ec_02_governance::{BootstrapConfig, GovernanceConfig, GovernanceFacade, VotingConfig};
use ec_03_consensus::adapters::{InMemoryChain, InMemoryState, ManualClock};
use ec_03_consensus::{ChainReader, ConsensusConfig, ConsensusEngine, ExtraData};
use shared_types::{Address, Block, BlockHeader, Hash, Measurement, Transaction, U256};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Measurement approved at bootstrap.
pub const BOOT_MR: Measurement = Measurement([0xB0; 32]);
/// A measurement governance never approved.
pub const ROGUE_MR: Measurement = Measurement([0xBA; 32]);
pub const GENESIS_SECS: u64 = 1_700_000_000;
pub const VOTING_PERIOD: u64 = 10;

pub type Engine = ConsensusEngine<SoftwareAttestor, SoftwareQuoteVerifier>;

pub fn governance_config(max_founders: u32) -> GovernanceConfig {
    GovernanceConfig {
        voting: VotingConfig {
            voting_period_blocks: VOTING_PERIOD,
            execution_delay_blocks: 5,
            ..VotingConfig::default()
        },
        bootstrap: BootstrapConfig {
            allowed_mr: BOOT_MR,
            max_founders,
        },
        ..GovernanceConfig::default()
    }
}

/// Governance with `founders` registered founders; the window is closed.
pub async fn bootstrapped_governance(founders: usize) -> (Arc<GovernanceFacade>, Vec<SoftwareAttestor>) {
    let gov = GovernanceFacade::new(
        governance_config(founders as u32),
        BOOT_MR,
        Arc::new(SoftwareQuoteVerifier::new()),
    )
    .unwrap();
    let mut attestors = Vec::new();
    for _ in 0..founders {
        let attestor = SoftwareAttestor::random(BOOT_MR);
        let rd = ReportData::new([0; 32], attestor.producer_id());
        let quote = attestor.generate_quote(&rd.to_bytes()).await.unwrap();
        gov.register_founder(attestor.producer_id(), &quote, 1).await.unwrap();
        attestors.push(attestor);
    }
    (Arc::new(gov), attestors)
}

pub fn genesis() -> Block {
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

pub fn transfer(from: Address, nonce: u64) -> Transaction {
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

/// One producing node sharing a clock with the rest of the network.
pub struct Node {
    pub engine: Arc<Engine>,
    pub state: InMemoryState,
}

impl Node {
    pub fn new(
        config: ConsensusConfig,
        attestor: SoftwareAttestor,
        policy: Arc<dyn MeasurementPolicy>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let engine = ConsensusEngine::new(
            config,
            Arc::new(attestor),
            Arc::new(SoftwareQuoteVerifier::new()),
            policy,
        )
        .unwrap()
        .with_time_source(clock);
        Self {
            engine: Arc::new(engine),
            state: InMemoryState::new(),
        }
    }

    /// A node whose local policy accepts only `mr`.
    pub fn standalone(mr: Measurement, clock: Arc<ManualClock>) -> Self {
        Self::new(
            ConsensusConfig::default(),
            SoftwareAttestor::random(mr),
            Arc::new(StaticMeasurementPolicy::new([mr])),
            clock,
        )
    }

    pub fn producer_id(&self) -> Address {
        self.engine.producer_id()
    }

    /// Prepare, finalize and seal a block on `parent`.
    pub async fn build_on(&self, chain: &dyn ChainReader, parent: &BlockHeader, txs: Vec<Transaction>) -> Block {
        let mut header = BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            gas_limit: 30_000_000,
            gas_used: 21_000 * txs.len() as u64,
            ..Default::default()
        };
        self.engine.prepare(chain, &mut header).await.unwrap();
        let block = self
            .engine
            .finalize_and_assemble(&self.state, header, txs)
            .unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        let (_stop, stop_rx) = watch::channel(false);
        self.engine.seal(block, tx, stop_rx).await.unwrap();
        rx.recv().await.unwrap()
    }

    /// Build on the canonical head and append.
    pub async fn extend(&self, chain: &InMemoryChain, txs: Vec<Transaction>) -> Block {
        let head = chain.current_header().unwrap();
        let block = self.build_on(chain, &head, txs).await;
        chain.append(block.clone());
        block
    }
}

/// Unverified candidate block with a well-formed envelope naming `producer`.
pub fn candidate_block(number: u64, producer: Address, txs: Vec<Transaction>) -> Block {
    let header = BlockHeader {
        parent_hash: [number as u8; 32],
        number,
        timestamp: GENESIS_SECS + number,
        difficulty: 1,
        gas_limit: 30_000_000,
        gas_used: 21_000 * txs.len() as u64,
        extra_data: ExtraData::new(vec![0xAB; 64], producer, GENESIS_SECS).encode(),
        ..Default::default()
    };
    Block::new(header, txs)
}

/// Plain block for chain-shape tests; no envelope.
pub fn plain_block(parent: Hash, number: u64, txs: Vec<Transaction>, salt: u8) -> Block {
    Block::new(
        BlockHeader {
            parent_hash: parent,
            number,
            timestamp: GENESIS_SECS + number,
            difficulty: 1,
            coinbase: [salt; 20],
            ..Default::default()
        },
        txs,
    )
}
