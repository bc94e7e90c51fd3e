//! In-memory host: chain store, transaction pool, balances and network totals.
//!
//! Used by development networks and the test suites.

use crate::domain::NetworkTotals;
use crate::ports::{BalanceChangeReason, ChainReader, Mempool, NetworkStats, StateMutator};
use parking_lot::RwLock;
use shared_types::{Address, Block, BlockHeader, Hash, Transaction, U256};
use std::collections::{BTreeMap, HashMap, HashSet};

// =============================================================================
// CHAIN
// =============================================================================

#[derive(Debug, Default)]
struct ChainState {
    blocks: HashMap<Hash, Block>,
    canonical: BTreeMap<u64, Hash>,
    head: Option<Hash>,
}

/// Block store with a movable canonical head.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain containing only `genesis`.
    pub fn with_genesis(genesis: Block) -> Self {
        let chain = Self::new();
        chain.append(genesis);
        chain
    }

    /// Store without touching the canonical chain.
    pub fn insert(&self, block: Block) -> Hash {
        let hash = block.hash();
        self.state.write().blocks.insert(hash, block);
        hash
    }

    /// Store and make canonical head.
    pub fn append(&self, block: Block) -> Hash {
        let hash = self.insert(block);
        self.set_head(&hash);
        hash
    }

    /// Re-point the canonical chain at `hash`. Unknown hashes are ignored.
    pub fn set_head(&self, hash: &Hash) -> bool {
        let mut state = self.state.write();
        let Some(head) = state.blocks.get(hash) else {
            return false;
        };
        let head_number = head.number();
        let mut canonical = BTreeMap::new();
        let mut cursor = Some(*hash);
        while let Some(h) = cursor {
            let Some(block) = state.blocks.get(&h) else {
                break;
            };
            canonical.insert(block.number(), h);
            cursor = (block.number() > 0).then_some(block.header.parent_hash);
        }
        let below_known = state
            .canonical
            .range(..canonical.keys().next().copied().unwrap_or(0))
            .map(|(n, h)| (*n, *h))
            .collect::<Vec<_>>();
        canonical.extend(below_known);
        canonical.retain(|n, _| *n <= head_number);
        state.canonical = canonical;
        state.head = Some(*hash);
        true
    }

    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChainReader for InMemoryChain {
    fn header_by_hash(&self, hash: &Hash, number: u64) -> Option<BlockHeader> {
        self.state
            .read()
            .blocks
            .get(hash)
            .filter(|b| b.number() == number)
            .map(|b| b.header.clone())
    }

    fn header_by_number(&self, number: u64) -> Option<BlockHeader> {
        let state = self.state.read();
        let hash = state.canonical.get(&number)?;
        state.blocks.get(hash).map(|b| b.header.clone())
    }

    fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.state.read().blocks.get(hash).cloned()
    }

    fn current_header(&self) -> Option<BlockHeader> {
        let state = self.state.read();
        let head = state.head?;
        state.blocks.get(&head).map(|b| b.header.clone())
    }
}

// =============================================================================
// MEMPOOL
// =============================================================================

#[derive(Debug, Default)]
struct PoolState {
    txs: HashMap<Hash, Transaction>,
    rejected: HashSet<Hash>,
    add_log: Vec<Hash>,
    remove_log: Vec<Hash>,
}

/// Transaction pool that records every add attempt and removal.
#[derive(Debug, Default)]
pub struct InMemoryMempool {
    state: RwLock<PoolState>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.state.read().txs.contains_key(hash)
    }

    /// Make future `add` calls for `hash` fail.
    pub fn reject(&self, hash: Hash) {
        self.state.write().rejected.insert(hash);
    }

    pub fn add_log(&self) -> Vec<Hash> {
        self.state.read().add_log.clone()
    }

    pub fn remove_log(&self) -> Vec<Hash> {
        self.state.read().remove_log.clone()
    }
}

impl Mempool for InMemoryMempool {
    fn pending(&self, enforce_tips: bool) -> HashMap<Address, Vec<Transaction>> {
        let state = self.state.read();
        let mut by_sender: HashMap<Address, Vec<Transaction>> = HashMap::new();
        for tx in state.txs.values() {
            if enforce_tips && tx.gas_price.is_zero() {
                continue;
            }
            by_sender.entry(tx.from).or_default().push(tx.clone());
        }
        for txs in by_sender.values_mut() {
            txs.sort_by_key(|tx| tx.nonce);
        }
        by_sender
    }

    fn pending_count(&self) -> usize {
        self.state.read().txs.len()
    }

    fn add(&self, txs: Vec<Transaction>, _sync: bool) -> Vec<Result<(), String>> {
        let mut state = self.state.write();
        txs.into_iter()
            .map(|tx| {
                state.add_log.push(tx.hash);
                if state.rejected.contains(&tx.hash) {
                    return Err(format!("transaction 0x{} rejected", hex::encode(tx.hash)));
                }
                if state.txs.contains_key(&tx.hash) {
                    return Err("already known".to_string());
                }
                state.txs.insert(tx.hash, tx);
                Ok(())
            })
            .collect()
    }

    fn remove(&self, hash: &Hash) -> bool {
        let mut state = self.state.write();
        state.remove_log.push(*hash);
        state.txs.remove(hash).is_some()
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Balance table.
#[derive(Debug, Default)]
pub struct InMemoryState {
    balances: RwLock<HashMap<Address, U256>>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.balances.read().get(address).copied().unwrap_or_default()
    }
}

impl StateMutator for InMemoryState {
    fn add_balance(&self, address: Address, amount: U256, _reason: BalanceChangeReason) -> Result<(), String> {
        let mut balances = self.balances.write();
        let balance = balances.entry(address).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| "balance overflow".to_string())?;
        Ok(())
    }
}

// =============================================================================
// NETWORK STATS
// =============================================================================

/// Totals set by the caller.
#[derive(Debug, Default)]
pub struct FixedNetworkStats {
    totals: RwLock<NetworkTotals>,
}

impl FixedNetworkStats {
    pub fn new(totals: NetworkTotals) -> Self {
        Self {
            totals: RwLock::new(totals),
        }
    }

    pub fn set(&self, totals: NetworkTotals) {
        *self.totals.write() = totals;
    }
}

impl NetworkStats for FixedNetworkStats {
    fn totals(&self) -> NetworkTotals {
        *self.totals.read()
    }
}
