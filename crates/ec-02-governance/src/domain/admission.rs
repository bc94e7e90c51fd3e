//! Node admission and hardware binding.
//!
//! A joining node presents a quote. Admission verifies it, checks the
//! measurement against the whitelist and binds the platform's hardware id
//! to the validator named in the quote's report data.

use crate::error::{GovernanceError, GovernanceResult};
use ec_01_attestation::{verify_with_timeout, AttestationError, MeasurementPolicy, QuoteVerifier};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Address, HardwareId, Measurement, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of the last admission attempt for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub node_id: NodeId,
    pub mr_enclave: Measurement,
    pub allowed: bool,
    pub reason: String,
    /// Unix seconds.
    pub connected_at: u64,
    pub last_verified: u64,
}

#[derive(Default)]
struct AdmissionState {
    records: HashMap<NodeId, AdmissionRecord>,
    hw_to_validator: HashMap<HardwareId, Address>,
    validator_to_hw: HashMap<Address, HardwareId>,
}

/// Join-time gate.
pub struct AdmissionController {
    verifier: Arc<dyn QuoteVerifier>,
    policy: Arc<dyn MeasurementPolicy>,
    verify_timeout: Duration,
    state: RwLock<AdmissionState>,
}

impl AdmissionController {
    pub fn new(
        verifier: Arc<dyn QuoteVerifier>,
        policy: Arc<dyn MeasurementPolicy>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            policy,
            verify_timeout,
            state: RwLock::new(AdmissionState::default()),
        }
    }

    /// Admit `node_id` claiming `claimed_mr`. Returns the bound validator address.
    pub async fn admit(
        &self,
        node_id: NodeId,
        claimed_mr: Measurement,
        quote: &[u8],
        now: u64,
    ) -> GovernanceResult<Address> {
        match self.check(claimed_mr, quote).await {
            Ok((mr, hardware_id, validator)) => {
                let mut state = self.state.write();
                state.hw_to_validator.insert(hardware_id, validator);
                state.validator_to_hw.insert(validator, hardware_id);
                let connected_at = state
                    .records
                    .get(&node_id)
                    .filter(|r| r.allowed)
                    .map(|r| r.connected_at)
                    .unwrap_or(now);
                state.records.insert(
                    node_id,
                    AdmissionRecord {
                        node_id,
                        mr_enclave: mr,
                        allowed: true,
                        reason: String::new(),
                        connected_at,
                        last_verified: now,
                    },
                );
                info!(
                    node = %hex::encode(&node_id.0[..8]),
                    mr_enclave = %mr,
                    validator = %hex::encode(validator),
                    "[ec-02] node admitted"
                );
                Ok(validator)
            }
            Err(err) => {
                warn!(
                    node = %hex::encode(&node_id.0[..8]),
                    kind = err.kind(),
                    "[ec-02] admission denied: {}",
                    err
                );
                self.state.write().records.insert(
                    node_id,
                    AdmissionRecord {
                        node_id,
                        mr_enclave: claimed_mr,
                        allowed: false,
                        reason: err.to_string(),
                        connected_at: now,
                        last_verified: now,
                    },
                );
                Err(err)
            }
        }
    }

    async fn check(
        &self,
        claimed_mr: Measurement,
        quote: &[u8],
    ) -> GovernanceResult<(Measurement, HardwareId, Address)> {
        verify_with_timeout(self.verifier.as_ref(), quote, self.verify_timeout)
            .await
            .map_err(|e| match e {
                AttestationError::VerificationFailed(_) => e,
                other => AttestationError::VerificationFailed(other.to_string()),
            })?;
        let mr = self.verifier.extract_measurement(quote)?;
        if mr != claimed_mr {
            return Err(GovernanceError::InvalidMr {
                expected: claimed_mr,
                actual: mr,
            });
        }
        if !self.policy.is_allowed(&mr) {
            return Err(GovernanceError::MrNotAllowed(mr));
        }
        let hardware_id = self.verifier.extract_hardware_id(quote)?;
        let validator = self.verifier.extract_producer_id(quote)?;
        if let Some(bound) = self.state.read().hw_to_validator.get(&hardware_id) {
            if *bound != validator {
                return Err(GovernanceError::HardwareAlreadyRegistered(*bound));
            }
        }
        Ok((mr, hardware_id, validator))
    }

    /// Mark a node as gone.
    pub fn record_disconnection(&self, node_id: &NodeId) -> GovernanceResult<()> {
        let mut state = self.state.write();
        let record = state
            .records
            .get_mut(node_id)
            .ok_or(GovernanceError::NodeNotFound)?;
        record.allowed = false;
        record.reason = "disconnected".to_string();
        Ok(())
    }

    /// Bind hardware to a validator out of band (bootstrap hand-off).
    pub fn register_validator_hardware(
        &self,
        validator: Address,
        hardware_id: HardwareId,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write();
        if let Some(bound) = state.hw_to_validator.get(&hardware_id) {
            if *bound != validator {
                return Err(GovernanceError::HardwareAlreadyRegistered(*bound));
            }
        }
        if let Some(old) = state.validator_to_hw.insert(validator, hardware_id) {
            state.hw_to_validator.remove(&old);
        }
        state.hw_to_validator.insert(hardware_id, validator);
        Ok(())
    }

    /// Release a validator's hardware binding.
    pub fn unregister_validator(&self, validator: &Address) -> Option<HardwareId> {
        let mut state = self.state.write();
        let hardware_id = state.validator_to_hw.remove(validator)?;
        state.hw_to_validator.remove(&hardware_id);
        Some(hardware_id)
    }

    pub fn validator_for_hardware(&self, hardware_id: &HardwareId) -> Option<Address> {
        self.state.read().hw_to_validator.get(hardware_id).copied()
    }

    pub fn hardware_for_validator(&self, validator: &Address) -> Option<HardwareId> {
        self.state.read().validator_to_hw.get(validator).copied()
    }

    pub fn get_record(&self, node_id: &NodeId) -> Option<AdmissionRecord> {
        self.state.read().records.get(node_id).cloned()
    }

    pub fn admitted_count(&self) -> usize {
        self.state.read().records.values().filter(|r| r.allowed).count()
    }
}
