//! Read-only RPC surface over the engine's scoring tables.
//!
//! Inputs arrive as hex strings, outputs are serialisable structs. Every
//! failure becomes an [`RpcError`] carrying a JSON-RPC code and the
//! snake-case error kind.

use super::engine::ConsensusEngine;
use crate::config::ConsensusConfig;
use crate::domain::{QualityScore, QualityTier, ReputationRecord, UptimeSnapshot};
use crate::error::ConsensusError;
use crate::ports::{ChainReader, NetworkStats};
use ec_01_attestation::{Attestor, QuoteVerifier};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash};
use std::fmt;
use std::sync::Arc;

/// JSON-RPC error codes used by the consensus API.
pub mod codes {
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    pub const RESOURCE_UNAVAILABLE: i32 = -32002;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    /// Snake-case error kind.
    pub kind: String,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            "invalid_params",
            format!("Invalid params: {}", details.into()),
        )
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            codes::RESOURCE_NOT_FOUND,
            "not_found",
            format!("Resource not found: {}", resource.into()),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.kind, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<ConsensusError> for RpcError {
    fn from(err: ConsensusError) -> Self {
        let code = match &err {
            ConsensusError::ServiceNotFound(_) | ConsensusError::UnknownAncestor(_) => {
                codes::RESOURCE_NOT_FOUND
            }
            ConsensusError::Stopped | ConsensusError::UpgradeReadOnly => codes::RESOURCE_UNAVAILABLE,
            ConsensusError::InvalidExtra(_) | ConsensusError::InvalidHeader(_) => codes::INVALID_PARAMS,
            _ => codes::INTERNAL_ERROR,
        };
        Self::new(code, err.kind(), err.to_string())
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockQualityResponse {
    pub block_hash: String,
    pub block_number: u64,
    pub tx_count: usize,
    pub score: QualityScore,
    pub tier: QualityTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReputationResponse {
    pub address: String,
    pub reputation: u64,
    /// `None` for nodes never seen.
    pub record: Option<ReputationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionResponse {
    pub address: String,
    pub excluded: bool,
    pub excluded_until: Option<u64>,
}

fn parse_bytes<const N: usize>(input: &str, what: &str) -> RpcResult<[u8; N]> {
    let raw = hex::decode(input.trim_start_matches("0x"))
        .map_err(|e| RpcError::invalid_params(format!("{} is not hex: {}", what, e)))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| RpcError::invalid_params(format!("{} must be {} bytes, got {}", what, N, raw.len())))
}

pub fn parse_address(input: &str) -> RpcResult<Address> {
    parse_bytes::<20>(input, "address")
}

pub fn parse_hash(input: &str) -> RpcResult<Hash> {
    parse_bytes::<32>(input, "block hash")
}

/// Holds a shared handle on the engine; never mutates it.
pub struct ConsensusRpc<A: Attestor, V: QuoteVerifier> {
    engine: Arc<ConsensusEngine<A, V>>,
    chain: Arc<dyn ChainReader>,
    stats: Arc<dyn NetworkStats>,
}

impl<A, V> ConsensusRpc<A, V>
where
    A: Attestor + 'static,
    V: QuoteVerifier + 'static,
{
    pub fn new(
        engine: Arc<ConsensusEngine<A, V>>,
        chain: Arc<dyn ChainReader>,
        stats: Arc<dyn NetworkStats>,
    ) -> Self {
        Self { engine, chain, stats }
    }

    pub fn get_block_quality(&self, block_hash: &str) -> RpcResult<BlockQualityResponse> {
        let hash = parse_hash(block_hash)?;
        let block = self
            .chain
            .block_by_hash(&hash)
            .ok_or_else(|| RpcError::not_found(format!("block 0x{}", hex::encode(hash))))?;
        let score = self.engine.scorer().score(&block);
        Ok(BlockQualityResponse {
            block_hash: format!("0x{}", hex::encode(hash)),
            block_number: block.number(),
            tx_count: block.tx_count(),
            tier: score.tier(),
            score,
        })
    }

    pub fn get_node_reputation(&self, address: &str) -> RpcResult<NodeReputationResponse> {
        let addr = parse_address(address)?;
        let reputation = self.engine.reputation();
        Ok(NodeReputationResponse {
            address: format!("0x{}", hex::encode(addr)),
            reputation: reputation.reputation(&addr),
            record: reputation.get(&addr),
        })
    }

    pub fn get_uptime_score(&self, address: &str) -> RpcResult<UptimeSnapshot> {
        let addr = parse_address(address)?;
        let now = self.engine.clock().now_secs();
        Ok(self.engine.uptime().snapshot(addr, now, self.stats.totals()))
    }

    pub fn is_node_excluded(&self, address: &str) -> RpcResult<ExclusionResponse> {
        let addr = parse_address(address)?;
        let penalties = self.engine.penalties();
        let now = self.engine.clock().now_secs();
        let excluded = penalties.is_excluded(&addr, now);
        Ok(ExclusionResponse {
            address: format!("0x{}", hex::encode(addr)),
            excluded,
            excluded_until: penalties.exclusion_end(&addr).filter(|_| excluded),
        })
    }

    pub fn get_config(&self) -> RpcResult<ConsensusConfig> {
        Ok(self.engine.config().clone())
    }

    pub fn get_penalty_count(&self, address: &str) -> RpcResult<usize> {
        let addr = parse_address(address)?;
        Ok(self.engine.penalties().penalty_count(&addr))
    }

    pub fn get_node_priority(&self, address: &str) -> RpcResult<u64> {
        let addr = parse_address(address)?;
        Ok(self.engine.reputation().priority(&addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FixedNetworkStats;
    use crate::domain::{NetworkTotals, PenaltyKind};
    use crate::ports::TimeSource;
    use crate::service::fixtures::{harness, Harness, TestRpc};
    use shared_types::U256;

    fn rpc(h: &Harness) -> TestRpc {
        let stats = Arc::new(FixedNetworkStats::new(NetworkTotals {
            total_txs: 100,
            total_gas: 2_100_000,
        }));
        h.engine.apis(h.chain.clone(), stats)
    }

    #[test]
    fn test_bad_params_rejected() {
        let h = harness();
        let api = rpc(&h);

        let err = api.get_node_priority("0xzz").unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        let err = api.get_penalty_count("0x0102").unwrap_err();
        assert!(err.message.contains("20 bytes"));
        let err = api.get_block_quality(&"11".repeat(32)).unwrap_err();
        assert_eq!(err.code, codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_block_quality_for_known_block() {
        let h = harness();
        let block = h.produce(vec![]).await;
        h.chain.append(block.clone());
        let api = rpc(&h);

        let resp = api
            .get_block_quality(&format!("0x{}", hex::encode(block.hash())))
            .unwrap();
        assert_eq!(resp.block_number, 1);
        assert_eq!(resp.score, h.engine.scorer().score(&block));
        assert_eq!(resp.tier, resp.score.tier());
    }

    #[test]
    fn test_unknown_node_defaults() {
        let h = harness();
        let api = rpc(&h);
        let addr = hex::encode([7u8; 20]);

        let rep = api.get_node_reputation(&addr).unwrap();
        assert!(rep.record.is_none());
        assert_eq!(rep.reputation, api.get_node_priority(&addr).unwrap());
        assert_eq!(api.get_penalty_count(&addr).unwrap(), 0);
        assert!(!api.is_node_excluded(&addr).unwrap().excluded);
        assert_eq!(api.get_uptime_score(&addr).unwrap().heartbeat_score, 0);
    }

    #[test]
    fn test_exclusion_visible_through_api() {
        let h = harness();
        let api = rpc(&h);
        let node = [9u8; 20];
        let now = h.clock.now_secs();
        for _ in 0..h.engine.config().penalty.penalty_threshold {
            h.engine
                .penalties()
                .record_penalty(node, PenaltyKind::Misbehavior, U256::one(), "test", now);
        }

        let status = api.is_node_excluded(&hex::encode(node)).unwrap();
        assert!(status.excluded);
        assert_eq!(
            status.excluded_until,
            Some(now + h.engine.config().penalty.exclusion_period_secs)
        );
        assert_eq!(
            api.get_penalty_count(&hex::encode(node)).unwrap(),
            h.engine.config().penalty.penalty_threshold
        );
    }

    #[test]
    fn test_config_and_error_mapping() {
        let h = harness();
        let api = rpc(&h);
        assert_eq!(api.get_config().unwrap(), *h.engine.config());

        let err: RpcError = ConsensusError::Stopped.into();
        assert_eq!(err.code, codes::RESOURCE_UNAVAILABLE);
        assert_eq!(err.kind, "stopped");
        let err: RpcError = ConsensusError::NoRewardData.into();
        assert_eq!(err.code, codes::INTERNAL_ERROR);
        assert_eq!(err.kind, "no_reward_data");
    }
}
