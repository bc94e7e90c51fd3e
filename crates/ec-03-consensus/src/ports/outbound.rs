//! Driven ports (outbound dependencies).
//!
//! The engine never owns chain data. Headers, blocks, balances and the
//! transaction pool are reached through these traits; the host supplies
//! the implementations.

use crate::domain::NetworkTotals;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Block, BlockHeader, Hash, Transaction, U256};
use std::collections::HashMap;

/// Read-only chain access. `None` signals absence.
pub trait ChainReader: Send + Sync {
    /// Header by hash, checked against the expected number.
    fn header_by_hash(&self, hash: &Hash, number: u64) -> Option<BlockHeader>;

    fn header_by_number(&self, number: u64) -> Option<BlockHeader>;

    fn block_by_hash(&self, hash: &Hash) -> Option<Block>;

    /// Canonical head.
    fn current_header(&self) -> Option<BlockHeader>;
}

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceChangeReason {
    BlockReward,
    CandidateReward,
}

/// State writes performed during finalization.
pub trait StateMutator: Send + Sync {
    fn add_balance(&self, address: Address, amount: U256, reason: BalanceChangeReason) -> Result<(), String>;
}

/// Transaction pool.
pub trait Mempool: Send + Sync {
    /// Executable transactions grouped by sender.
    fn pending(&self, enforce_tips: bool) -> HashMap<Address, Vec<Transaction>>;

    fn pending_count(&self) -> usize;

    /// One result per input transaction.
    fn add(&self, txs: Vec<Transaction>, sync: bool) -> Vec<Result<(), String>>;

    /// Returns whether the transaction was present.
    fn remove(&self, hash: &Hash) -> bool;
}

/// Optional block gossip.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast_block(&self, block: &Block, propagate: bool);

    async fn broadcast_header(&self, header: &BlockHeader);
}

/// Tells the host miner to start building on `parent`.
pub trait WorkTrigger: Send + Sync {
    fn trigger_work(&self, parent: &BlockHeader);
}

/// Whether this node currently refuses writes (upgrade mode).
pub trait WriteGate: Send + Sync {
    fn is_read_only(&self) -> bool;
}

/// Network-wide transaction totals for participation scoring.
pub trait NetworkStats: Send + Sync {
    fn totals(&self) -> NetworkTotals;
}

/// Time source for timestamp validation
pub trait TimeSource: Send + Sync {
    /// Unix milliseconds.
    fn now_millis(&self) -> u64;

    /// Unix seconds.
    fn now_secs(&self) -> u64 {
        self.now_millis() / 1_000
    }
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
