//! # Engine Flows
//!
//! Governance-backed consensus: producers whose measurement is on the
//! whitelist seal blocks that every other node accepts; anything else is
//! rejected until a proposal approves it.

use super::fixtures::*;
use ec_01_attestation::{Attestor, SoftwareAttestor};
use ec_03_consensus::adapters::{
    ChannelWorkTrigger, FixedNetworkStats, InMemoryChain, InMemoryMempool, ManualClock,
};
use ec_03_consensus::{
    select_best, BlockProducer, ChainReader, ConsensusConfig, ConsensusError, Mempool,
    NetworkTotals, ProduceDecision, ReorgHandler, TickOutcome, WriteGate,
};
use shared_types::{keccak256, Measurement};
use std::sync::Arc;

async fn governed_pair() -> (Arc<ec_02_governance::GovernanceFacade>, Node, Node, Arc<ManualClock>) {
    let (gov, mut founders) = bootstrapped_governance(2).await;
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS + 5));
    let b = founders.pop().unwrap();
    let a = founders.pop().unwrap();
    let node_a = Node::new(ConsensusConfig::default(), a, gov.policy(), clock.clone());
    let node_b = Node::new(ConsensusConfig::default(), b, gov.policy(), clock.clone());
    (gov, node_a, node_b, clock)
}

#[tokio::test]
async fn test_founders_produce_and_cross_verify() {
    let (_gov, a, b, _clock) = governed_pair().await;
    let chain = InMemoryChain::with_genesis(genesis());

    let first = a.extend(&chain, vec![transfer([1; 20], 0)]).await;
    b.engine.verify_header(&chain, &first.header).await.unwrap();
    let second = b.extend(&chain, vec![transfer([1; 20], 1)]).await;
    a.engine.verify_header(&chain, &second.header).await.unwrap();

    assert_eq!(first.header.coinbase, a.producer_id());
    assert_eq!(
        &b.engine.author(&first.header).unwrap()[..],
        &keccak256(&a.producer_id())[..20]
    );
    assert!(a.state.balance(&a.producer_id()) >= a.engine.config().reward.base_block_reward);

    for block in [&first, &second] {
        a.engine.record_imported_block(block).unwrap();
    }
    assert_eq!(a.engine.rewards().blocks_produced(&b.producer_id()), 1);
    assert_eq!(
        a.engine.uptime().participation(&b.producer_id()).processed_txs,
        1
    );
}

#[tokio::test]
async fn test_unapproved_measurement_rejected_and_penalized() {
    let (_gov, a, _b, clock) = governed_pair().await;
    let chain = InMemoryChain::with_genesis(genesis());
    let rogue = Node::standalone(ROGUE_MR, clock);

    let block = rogue.extend(&chain, vec![]).await;
    rogue.engine.verify_header(&chain, &block.header).await.unwrap();

    let err = a.engine.verify_header(&chain, &block.header).await.unwrap_err();
    assert!(matches!(err, ConsensusError::MrNotAllowed(mr) if mr == ROGUE_MR));
    a.engine.report_invalid_block(rogue.producer_id(), &err);
    assert_eq!(a.engine.penalties().penalty_count(&rogue.producer_id()), 1);
    assert_eq!(
        a.engine.reputation().get(&rogue.producer_id()).unwrap().failed_blocks,
        1
    );
}

#[tokio::test]
async fn test_measurement_approved_by_proposal_becomes_valid() {
    let (gov, founders) = bootstrapped_governance(1).await;
    let founder = founders[0].producer_id();
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS + 5));
    let verifier = Node::new(
        ConsensusConfig::default(),
        SoftwareAttestor::random(BOOT_MR),
        gov.policy(),
        clock.clone(),
    );
    let new_mr = Measurement([0xC2; 32]);
    let upgraded = Node::standalone(new_mr, clock);
    let chain = InMemoryChain::with_genesis(genesis());
    let block = upgraded.extend(&chain, vec![transfer([4; 20], 0)]).await;

    assert_eq!(
        verifier
            .engine
            .verify_header(&chain, &block.header)
            .await
            .unwrap_err()
            .kind(),
        "MR_not_allowed"
    );

    let id = gov.propose_add_mr(founder, new_mr, "v2 enclave", 10).unwrap();
    gov.vote(&id, founder, true, &[], 11).unwrap();
    assert!(gov.process_block(10 + VOTING_PERIOD).is_empty());
    assert_eq!(gov.process_block(10 + VOTING_PERIOD + 5), vec![id]);

    verifier.engine.verify_header(&chain, &block.header).await.unwrap();
}

#[tokio::test]
async fn test_competing_blocks_fork_choice_and_reorg() {
    let (_gov, a, b, _clock) = governed_pair().await;
    let chain = Arc::new(InMemoryChain::with_genesis(genesis()));
    let head = chain.current_header().unwrap();

    let only_b = transfer([9; 20], 0);
    let heavy = a
        .build_on(chain.as_ref(), &head, vec![transfer([8; 20], 0), transfer([8; 20], 1)])
        .await;
    let light = b.build_on(chain.as_ref(), &head, vec![only_b.clone()]).await;

    let candidates = [light.clone(), heavy.clone()];
    assert_eq!(select_best(&candidates).unwrap().hash(), heavy.hash());

    chain.append(light.clone());
    chain.insert(heavy.clone());
    let mempool = Arc::new(InMemoryMempool::new());
    let outcome = ReorgHandler::new(chain.clone(), mempool.clone())
        .handle_reorg(&light, &heavy)
        .unwrap();
    chain.set_head(&heavy.hash());

    assert_eq!(outcome.depth, 1);
    assert_eq!(outcome.ancestor, head.hash());
    assert!(mempool.contains(&only_b.hash));
    assert_eq!(chain.current_header().unwrap().hash(), heavy.hash());
}

#[tokio::test]
async fn test_batch_verification_of_alternating_producers() {
    let (_gov, a, b, _clock) = governed_pair().await;
    let chain = InMemoryChain::with_genesis(genesis());
    let mut headers = Vec::new();
    for i in 0..4 {
        let node = if i % 2 == 0 { &a } else { &b };
        headers.push(node.extend(&chain, vec![transfer([2; 20], i)]).await.header);
    }

    let fresh: Arc<dyn ChainReader> = Arc::new(InMemoryChain::with_genesis(genesis()));
    let (_abort, mut results) = a.engine.verify_headers(fresh, headers);
    let mut verified = 0;
    while let Some(result) = results.recv().await {
        result.unwrap();
        verified += 1;
    }
    assert_eq!(verified, 4);
}

#[tokio::test]
async fn test_producer_uses_governance_write_gate() {
    let (gov, a, _b, _clock) = governed_pair().await;
    let chain = Arc::new(InMemoryChain::with_genesis(genesis()));
    let mempool = Arc::new(InMemoryMempool::new());
    let (trigger, mut work) = ChannelWorkTrigger::new();
    let gate: Arc<dyn WriteGate> = gov.clone();
    assert!(!gate.is_read_only());

    let producer = BlockProducer::new(
        a.engine.as_ref(),
        chain.clone(),
        mempool.clone(),
        Arc::new(trigger),
        gate,
    );
    mempool.add(vec![transfer([3; 20], 0)], false);

    assert_eq!(producer.tick(), TickOutcome::Triggered(ProduceDecision::TxCount));
    assert_eq!(work.recv().await.unwrap().number, 0);
}

#[tokio::test]
async fn test_rpc_reports_on_imported_blocks() {
    let (_gov, a, b, _clock) = governed_pair().await;
    let chain = Arc::new(InMemoryChain::with_genesis(genesis()));
    let block = b.extend(chain.as_ref(), vec![transfer([6; 20], 0)]).await;
    a.engine.record_imported_block(&block).unwrap();

    let stats = Arc::new(FixedNetworkStats::new(NetworkTotals {
        total_txs: 1,
        total_gas: 21_000,
    }));
    let api = a.engine.apis(chain.clone(), stats);
    let quality = api
        .get_block_quality(&format!("0x{}", hex::encode(block.hash())))
        .unwrap();
    assert_eq!(quality.tx_count, 1);

    let producer = hex::encode(b.producer_id());
    let rep = api.get_node_reputation(&producer).unwrap();
    assert_eq!(rep.record.unwrap().successful_blocks, 1);
    let uptime = api.get_uptime_score(&producer).unwrap();
    assert_eq!(uptime.tx_participation_score, 10_000);
    assert!(!api.is_node_excluded(&producer).unwrap().excluded);
}
