//! Mempool maintenance across chain reorganizations.
//!
//! Transactions dropped with the old branch go back to the pool before the
//! transactions of the new branch are removed from it.

use crate::error::{ConsensusError, ConsensusResult};
use crate::metrics;
use crate::ports::{ChainReader, Mempool};
use shared_types::{Block, Hash, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgOutcome {
    /// Blocks dropped from the old branch.
    pub depth: usize,
    pub ancestor: Hash,
    pub old_branch: Vec<Hash>,
    pub new_branch: Vec<Hash>,
    /// Re-admission attempts.
    pub readded: usize,
    pub removed: usize,
}

pub struct ReorgHandler {
    chain: Arc<dyn ChainReader>,
    mempool: Arc<dyn Mempool>,
}

impl ReorgHandler {
    pub fn new(chain: Arc<dyn ChainReader>, mempool: Arc<dyn Mempool>) -> Self {
        Self { chain, mempool }
    }

    fn parent_of(&self, block: &Block) -> ConsensusResult<Block> {
        if block.number() == 0 {
            return Err(ConsensusError::UnknownAncestor(block.header.parent_hash));
        }
        self.chain
            .block_by_hash(&block.header.parent_hash)
            .ok_or(ConsensusError::UnknownAncestor(block.header.parent_hash))
    }

    /// Walk both heads back to their common ancestor. Branches are ordered
    /// head first.
    pub fn find_branches(&self, old_head: &Block, new_head: &Block) -> ConsensusResult<(Hash, Vec<Block>, Vec<Block>)> {
        let mut old = old_head.clone();
        let mut new = new_head.clone();
        let mut old_branch = Vec::new();
        let mut new_branch = Vec::new();

        while old.number() > new.number() {
            let parent = self.parent_of(&old)?;
            old_branch.push(std::mem::replace(&mut old, parent));
        }
        while new.number() > old.number() {
            let parent = self.parent_of(&new)?;
            new_branch.push(std::mem::replace(&mut new, parent));
        }
        while old.hash() != new.hash() {
            let old_parent = self.parent_of(&old)?;
            let new_parent = self.parent_of(&new)?;
            old_branch.push(std::mem::replace(&mut old, old_parent));
            new_branch.push(std::mem::replace(&mut new, new_parent));
        }
        Ok((old.hash(), old_branch, new_branch))
    }

    pub fn handle_reorg(&self, old_head: &Block, new_head: &Block) -> ConsensusResult<ReorgOutcome> {
        let (ancestor, old_branch, new_branch) = self.find_branches(old_head, new_head)?;

        let included: HashSet<Hash> = new_branch.iter().flat_map(|b| b.tx_hashes().copied()).collect();
        let returning: Vec<Transaction> = old_branch
            .iter()
            .rev()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !included.contains(&tx.hash))
            .cloned()
            .collect();
        let readded = returning.len();
        let hashes: Vec<Hash> = returning.iter().map(|tx| tx.hash).collect();
        for (hash, result) in hashes.iter().zip(self.mempool.add(returning, false)) {
            if let Err(e) = result {
                warn!(tx = %hex::encode(hash), "[ec-03] reorg re-admission failed: {}", e);
            }
        }

        let mut removed = 0;
        for hash in new_branch.iter().flat_map(|b| b.tx_hashes()) {
            self.mempool.remove(hash);
            removed += 1;
        }

        let depth = old_branch.len();
        metrics::record_reorg(depth);
        info!(
            depth,
            new_blocks = new_branch.len(),
            readded,
            removed,
            ancestor = %hex::encode(ancestor),
            "[ec-03] reorg handled"
        );
        Ok(ReorgOutcome {
            depth,
            ancestor,
            old_branch: old_branch.iter().map(Block::hash).collect(),
            new_branch: new_branch.iter().map(Block::hash).collect(),
            readded,
            removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChain, InMemoryMempool};
    use shared_types::{BlockHeader, U256};

    fn make_tx(sender: u8, nonce: u64) -> Transaction {
        Transaction::new([sender; 20], None, U256::zero(), nonce, U256::one(), 21_000, vec![])
    }

    fn child(parent: &Block, salt: u8, txs: Vec<Transaction>) -> Block {
        let header = BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            timestamp: parent.header.timestamp + 1,
            difficulty: 1,
            extra_data: vec![salt],
            ..BlockHeader::default()
        };
        Block::new(header, txs)
    }

    fn setup() -> (Arc<InMemoryChain>, Arc<InMemoryMempool>, ReorgHandler, Block) {
        let genesis = Block::new(BlockHeader::default(), vec![]);
        let chain = Arc::new(InMemoryChain::with_genesis(genesis.clone()));
        let pool = Arc::new(InMemoryMempool::new());
        let handler = ReorgHandler::new(chain.clone(), pool.clone());
        (chain, pool, handler, genesis)
    }

    #[test]
    fn test_sibling_reorg_returns_transactions() {
        let (chain, pool, handler, genesis) = setup();
        let shared = make_tx(1, 0);
        let dropped = make_tx(2, 0);
        let fresh = make_tx(3, 0);

        let old = child(&genesis, 1, vec![shared.clone(), dropped.clone()]);
        let new = child(&genesis, 2, vec![shared.clone(), fresh.clone()]);
        chain.append(old.clone());
        chain.insert(new.clone());
        pool.add(vec![fresh.clone()], false);

        let outcome = handler.handle_reorg(&old, &new).unwrap();
        assert_eq!(outcome.depth, 1);
        assert_eq!(outcome.ancestor, genesis.hash());
        assert_eq!(outcome.readded, 1);
        assert!(pool.contains(&dropped.hash));
        assert!(!pool.contains(&fresh.hash));
        assert!(!pool.contains(&shared.hash));

        let mut removed = pool.remove_log();
        removed.sort();
        let mut expected = vec![shared.hash, fresh.hash];
        expected.sort();
        assert_eq!(removed, expected);
    }

    #[test]
    fn test_uneven_branches() {
        let (chain, _pool, handler, genesis) = setup();
        let a1 = child(&genesis, 1, vec![]);
        let a2 = child(&a1, 1, vec![]);
        let a3 = child(&a2, 1, vec![make_tx(1, 0)]);
        let b2 = child(&a1, 2, vec![]);
        for b in [&a1, &a2, &a3, &b2] {
            chain.insert(b.clone());
        }
        let outcome = handler.handle_reorg(&a3, &b2).unwrap();
        assert_eq!(outcome.ancestor, a1.hash());
        assert_eq!(outcome.depth, 2);
        assert_eq!(outcome.new_branch, vec![b2.hash()]);
        assert_eq!(outcome.old_branch, vec![a3.hash(), a2.hash()]);
    }

    #[test]
    fn test_readmission_errors_do_not_propagate() {
        let (chain, pool, handler, genesis) = setup();
        let tx = make_tx(5, 0);
        pool.reject(tx.hash);
        let old = child(&genesis, 1, vec![tx.clone()]);
        let new = child(&genesis, 2, vec![]);
        chain.insert(old.clone());
        chain.insert(new.clone());
        let outcome = handler.handle_reorg(&old, &new).unwrap();
        assert_eq!(outcome.readded, 1);
        assert_eq!(pool.add_log(), vec![tx.hash]);
    }

    #[test]
    fn test_missing_parent() {
        let (_chain, _pool, handler, genesis) = setup();
        let orphan_parent = child(&genesis, 9, vec![]);
        let orphan = child(&orphan_parent, 9, vec![]);
        let other = child(&genesis, 1, vec![]);
        let err = handler.handle_reorg(&orphan, &other).unwrap_err();
        assert_eq!(err.kind(), "unknown_ancestor");
    }
}
