//! Proposal and vote records.

use crate::domain::whitelist::PermissionLevel;
use crate::error::{GovernanceError, GovernanceResult};
use serde::{Deserialize, Serialize};
use shared_types::{keccak256, Address, Hash, Measurement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    AddMrEnclave,
    RemoveMrEnclave,
    UpgradePermission,
    AddValidator,
    RemoveValidator,
    ParameterChange,
    NormalUpgrade,
    EmergencyUpgrade,
}

impl ProposalType {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Self::EmergencyUpgrade)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Passed,
    Rejected,
    Executed,
    Cancelled,
    Expired,
}

/// Typed view of a proposal's target bytes.
///
/// Wire forms:
/// - measurement targets: 32 bytes
/// - permission upgrade: 32-byte measurement ‖ 1-byte level
/// - validator targets: 20-byte address
/// - parameter change: 1-byte key length ‖ key ‖ value (UTF-8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalTarget {
    Measurement(Measurement),
    Permission(Measurement, PermissionLevel),
    Validator(Address),
    Parameter { key: String, value: String },
}

impl ProposalTarget {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Measurement(mr) => mr.as_bytes().to_vec(),
            Self::Permission(mr, level) => {
                let mut out = mr.as_bytes().to_vec();
                out.push(level.as_u8());
                out
            }
            Self::Validator(address) => address.to_vec(),
            Self::Parameter { key, value } => {
                let mut out = Vec::with_capacity(1 + key.len() + value.len());
                out.push(key.len() as u8);
                out.extend_from_slice(key.as_bytes());
                out.extend_from_slice(value.as_bytes());
                out
            }
        }
    }

    pub fn decode(kind: ProposalType, raw: &[u8]) -> GovernanceResult<Self> {
        let bad = |msg: &str| GovernanceError::InvalidProposal(msg.to_string());
        match kind {
            ProposalType::AddMrEnclave
            | ProposalType::RemoveMrEnclave
            | ProposalType::NormalUpgrade
            | ProposalType::EmergencyUpgrade => Measurement::from_slice(raw)
                .map(Self::Measurement)
                .map_err(|e| bad(&e.to_string())),
            ProposalType::UpgradePermission => {
                if raw.len() != 33 {
                    return Err(bad("permission target must be 33 bytes"));
                }
                let mr = Measurement::from_slice(&raw[..32]).map_err(|e| bad(&e.to_string()))?;
                let level = PermissionLevel::from_u8(raw[32]).ok_or_else(|| bad("unknown level"))?;
                Ok(Self::Permission(mr, level))
            }
            ProposalType::AddValidator | ProposalType::RemoveValidator => {
                let address: Address = raw
                    .try_into()
                    .map_err(|_| bad("validator target must be 20 bytes"))?;
                Ok(Self::Validator(address))
            }
            ProposalType::ParameterChange => {
                let (len, rest) = raw.split_first().ok_or_else(|| bad("empty parameter"))?;
                let len = *len as usize;
                if len == 0 || rest.len() < len {
                    return Err(bad("malformed parameter target"));
                }
                let key = std::str::from_utf8(&rest[..len]).map_err(|_| bad("key not UTF-8"))?;
                let value =
                    std::str::from_utf8(&rest[len..]).map_err(|_| bad("value not UTF-8"))?;
                Ok(Self::Parameter {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Hash,
    pub proposal_type: ProposalType,
    pub proposer: Address,
    pub target: Vec<u8>,
    pub description: String,
    pub created_at: u64,
    pub voting_ends_at: u64,
    pub execute_after: u64,
    pub status: ProposalStatus,
    pub core_yes: u64,
    pub core_no: u64,
    pub community_yes: u64,
    pub community_no: u64,
}

impl Proposal {
    /// `keccak(type ‖ proposer ‖ target ‖ created_at)`.
    pub fn compute_id(
        proposal_type: ProposalType,
        proposer: &Address,
        target: &[u8],
        created_at: u64,
    ) -> Hash {
        let mut preimage = Vec::with_capacity(1 + 20 + target.len() + 8);
        preimage.push(proposal_type.as_u8());
        preimage.extend_from_slice(proposer);
        preimage.extend_from_slice(target);
        preimage.extend_from_slice(&created_at.to_be_bytes());
        keccak256(&preimage)
    }

    pub fn decoded_target(&self) -> GovernanceResult<ProposalTarget> {
        ProposalTarget::decode(self.proposal_type, &self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: Hash,
    pub voter: Address,
    pub support: bool,
    pub weight: u64,
    /// Block number the vote was cast at.
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

/// Digest a voter signs: `keccak(proposal_id ‖ support)`.
pub fn vote_digest(proposal_id: &Hash, support: bool) -> Hash {
    let mut preimage = [0u8; 33];
    preimage[..32].copy_from_slice(proposal_id);
    preimage[32] = support as u8;
    keccak256(&preimage)
}
