//! Engine services composed over the domain tables.

pub mod engine;
pub mod reorg;
pub mod rpc;
pub mod tasks;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fixtures;

pub use engine::{ConsensusEngine, FinalizeSummary, DIFFICULTY};
pub use reorg::{ReorgHandler, ReorgOutcome};
pub use rpc::{
    BlockQualityResponse, ConsensusRpc, ExclusionResponse, NodeReputationResponse, RpcError,
    RpcResult,
};
pub use tasks::{broadcast_sealed, reputation_rollup, wait_for_stop, BlockProducer, TickOutcome, PRODUCE_TICK};
pub use verifier::HeaderVerifier;
