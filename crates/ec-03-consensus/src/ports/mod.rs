//! Host collaborators of the consensus engine.

pub mod outbound;

pub use outbound::{
    BalanceChangeReason, Broadcaster, ChainReader, Mempool, NetworkStats, StateMutator,
    SystemTimeSource, TimeSource, WorkTrigger, WriteGate,
};
