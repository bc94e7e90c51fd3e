//! Fork-choice between competing blocks at the same height.
//!
//! Preference order:
//! 1. more transactions
//! 2. earlier timestamp
//! 3. smaller block hash (lexicographic)
//!
//! The header-only rule skips (1) and is used before bodies arrive.

use shared_types::{Block, BlockHeader};
use std::cmp::Ordering;

/// `Less` when `a` is preferred.
pub fn fork_choice_ordering(a: &Block, b: &Block) -> Ordering {
    b.tx_count()
        .cmp(&a.tx_count())
        .then_with(|| header_ordering(&a.header, &b.header))
}

/// Header-only ordering: earlier timestamp, then smaller hash. `Less` when `a` is preferred.
pub fn header_ordering(a: &BlockHeader, b: &BlockHeader) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.hash().cmp(&b.hash()))
}

/// `+1` if `a` wins, `-1` if `b` wins, `0` if identical.
pub fn compare(a: &Block, b: &Block) -> i8 {
    match fork_choice_ordering(a, b) {
        Ordering::Less => 1,
        Ordering::Equal => 0,
        Ordering::Greater => -1,
    }
}

pub fn compare_headers(a: &BlockHeader, b: &BlockHeader) -> i8 {
    match header_ordering(a, b) {
        Ordering::Less => 1,
        Ordering::Equal => 0,
        Ordering::Greater => -1,
    }
}

/// Preferred block, or `None` for an empty slice.
pub fn select_best(candidates: &[Block]) -> Option<&Block> {
    candidates.iter().min_by(|a, b| fork_choice_ordering(a, b))
}
