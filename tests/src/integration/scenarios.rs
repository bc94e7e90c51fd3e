//! # End-to-End Scenarios
//!
//! 1. Three-candidate reward split
//! 2. Community veto
//! 3. Emergency upgrade unanimity
//! 4. Penalty exclusion window
//! 5. Reorg returns dropped transactions to the pool
//! 6. Producer id mismatch between quote and envelope

use super::fixtures::*;
use ec_01_attestation::Attestor;
use ec_02_governance::{ProposalStatus, ProposalTarget, ProposalType};
use ec_03_consensus::adapters::{InMemoryChain, InMemoryMempool, ManualClock};
use ec_03_consensus::{
    decode_header_extra, ConsensusConfig, Mempool, PenaltyKind, ReorgHandler, SubmitOutcome,
};
use primitive_types::U256;
use shared_types::Measurement;
use std::sync::Arc;

fn one_ether() -> U256 {
    U256::exp10(18)
}

// =============================================================================
// 1. THREE-CANDIDATE SPLIT
// =============================================================================

#[tokio::test]
async fn test_three_candidate_reward_split() {
    let mut config = ConsensusConfig::default();
    config.candidates.speed_reward_ratios_bps = vec![10_000, 6_000, 3_000];
    config.candidates.max_candidates = 3;
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS));
    let settler = Node::new(
        config,
        ec_01_attestation::SoftwareAttestor::random(BOOT_MR),
        Arc::new(ec_01_attestation::StaticMeasurementPolicy::new([BOOT_MR])),
        clock,
    );

    let (p1, p2, p3) = ([0x01; 20], [0x02; 20], [0x03; 20]);
    let base: Vec<_> = (0..30).map(|n| transfer([0xA1; 20], n)).collect();
    let subset = base[..20].to_vec();
    let disjoint: Vec<_> = (0..10).map(|n| transfer([0xB2; 20], n)).collect();

    let engine = &settler.engine;
    for (block, at) in [
        (candidate_block(100, p1, base), 1_000),
        (candidate_block(100, p2, subset), 1_100),
        (candidate_block(100, p3, disjoint), 1_200),
    ] {
        assert_eq!(engine.submit_candidate(block, at).unwrap(), SubmitOutcome::Accepted);
    }

    let pool = one_ether();
    let dist = engine.settle_candidates(&settler.state, 100, pool).unwrap();

    let reward_of = |p| settler.state.balance(&p);
    assert!(reward_of(p2).is_zero());
    assert!(!reward_of(p3).is_zero());
    assert!(reward_of(p3) < reward_of(p1));
    assert!(dist.total_distributed <= pool);
    assert_eq!(reward_of(p1) + reward_of(p3), dist.total_distributed);
}

// =============================================================================
// 2. COMMUNITY VETO
// =============================================================================

#[tokio::test]
async fn test_community_veto_rejects_add_mr() {
    let (gov, founders) = bootstrapped_governance(3).await;
    let min_stake = gov.config().staking.min_stake;
    let community: Vec<_> = (0..4u8).map(|i| [0xC0 + i; 20]).collect();
    for member in &community {
        gov.stake(*member, min_stake, 2).unwrap();
    }

    let new_mr = Measurement([0xD1; 32]);
    let id = gov
        .propose_add_mr(founders[0].producer_id(), new_mr, "v2 enclave", 10)
        .unwrap();
    for founder in &founders {
        gov.vote(&id, founder.producer_id(), true, &[], 11).unwrap();
    }
    for member in &community {
        gov.vote(&id, *member, false, &[], 12).unwrap();
    }

    let ends_at = gov.get_proposal(&id).unwrap().voting_ends_at;
    assert_eq!(gov.check_status(&id, ends_at).unwrap(), ProposalStatus::Rejected);
    assert!(gov.process_block(ends_at + 10).is_empty());
    assert!(!gov.whitelist().is_allowed(&new_mr));
}

// =============================================================================
// 3. EMERGENCY UNANIMITY
// =============================================================================

#[tokio::test]
async fn test_emergency_upgrade_requires_unanimous_core() {
    let (gov, founders) = bootstrapped_governance(3).await;
    let target = ProposalTarget::Measurement(Measurement([0xE1; 32]));
    let proposer = founders[0].producer_id();

    let split = gov
        .propose(proposer, ProposalType::EmergencyUpgrade, target.clone(), "patch", 10)
        .unwrap();
    gov.vote(&split, founders[0].producer_id(), true, &[], 11).unwrap();
    gov.vote(&split, founders[1].producer_id(), true, &[], 11).unwrap();
    // founders[2] abstains

    let unanimous = gov
        .propose(founders[1].producer_id(), ProposalType::EmergencyUpgrade, target, "patch again", 10)
        .unwrap();
    for founder in &founders {
        gov.vote(&unanimous, founder.producer_id(), true, &[], 11).unwrap();
    }

    let ends_at = 10 + VOTING_PERIOD;
    assert_eq!(gov.check_status(&split, ends_at).unwrap(), ProposalStatus::Rejected);
    assert_eq!(gov.check_status(&unanimous, ends_at).unwrap(), ProposalStatus::Passed);
}

// =============================================================================
// 4. PENALTY WINDOW
// =============================================================================

#[test]
fn test_penalty_exclusion_window() {
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS));
    let node = Node::standalone(BOOT_MR, clock);
    let penalties = node.engine.penalties();
    let offender = [0x0F; 20];
    let t = GENESIS_SECS;
    let amount = node.engine.config().penalty.penalty_amount;
    let period = node.engine.config().penalty.exclusion_period_secs;

    for (i, kind) in [PenaltyKind::InvalidBlock, PenaltyKind::EmptyBlock, PenaltyKind::Offline]
        .into_iter()
        .enumerate()
    {
        penalties.record_penalty(offender, kind, amount, "scenario", t + i as u64);
    }

    assert!(penalties.is_excluded(&offender, t + 3));
    assert_eq!(
        penalties.check_not_excluded(&offender, t + 3).unwrap_err().kind(),
        "node_excluded"
    );
    assert!(!penalties.is_excluded(&offender, t + 2 + period));
    assert!(penalties.check_not_excluded(&offender, t + 2 + period).is_ok());
}

// =============================================================================
// 5. REORG TX RETURN
// =============================================================================

#[test]
fn test_reorg_returns_dropped_transaction() {
    let genesis = genesis();
    let chain = Arc::new(InMemoryChain::with_genesis(genesis.clone()));
    let mut parent = genesis.hash();
    for number in 1..=102 {
        let block = plain_block(parent, number, vec![], 0);
        parent = chain.append(block);
    }

    let t = transfer([0x77; 20], 0);
    let other = transfer([0x78; 20], 0);
    let x = plain_block(parent, 103, vec![t.clone()], 1);
    let y = plain_block(parent, 103, vec![other.clone()], 2);
    chain.append(x.clone());
    chain.insert(y.clone());

    let mempool = Arc::new(InMemoryMempool::new());
    let handler = ReorgHandler::new(chain.clone(), mempool.clone());
    let outcome = handler.handle_reorg(&x, &y).unwrap();

    assert_eq!(outcome.depth, 1);
    let pending = mempool.pending(false);
    assert!(pending
        .get(&t.from)
        .is_some_and(|txs| txs.iter().any(|tx| tx.hash == t.hash)));
    assert!(!mempool.contains(&other.hash));
    assert_eq!(mempool.remove_log(), vec![other.hash]);
}

// =============================================================================
// 6. PRODUCER ID MISMATCH
// =============================================================================

#[tokio::test]
async fn test_quote_producer_mismatch_rejected() {
    let clock = Arc::new(ManualClock::from_secs(GENESIS_SECS + 5));
    let node = Node::standalone(BOOT_MR, clock);
    let chain = InMemoryChain::with_genesis(genesis());

    let block = node.extend(&chain, vec![transfer([1; 20], 0)]).await;
    node.engine.verify_header(&chain, &block.header).await.unwrap();

    let mut extra = decode_header_extra(&block.header).unwrap();
    extra.producer_id = [0x5E; 20];
    let mut forged = block.header.clone();
    forged.extra_data = extra.encode();

    let err = node.engine.verify_header(&chain, &forged).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_producer_id");
}
