//! Founder registration window.
//!
//! Up to `max_founders` callers may register against the single allowed
//! measurement, each from a distinct platform. The window closes for good
//! once the cap is reached.

use crate::config::BootstrapConfig;
use crate::error::{GovernanceError, GovernanceResult};
use parking_lot::RwLock;
use shared_types::{Address, HardwareId, Measurement};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Point-in-time copy of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapState {
    pub allowed_mr: Measurement,
    pub max_founders: u32,
    pub founder_count: u32,
    pub ended: bool,
    pub founders: BTreeSet<Address>,
    pub hardware_to_founder: HashMap<HardwareId, Address>,
}

pub struct BootstrapContract {
    state: RwLock<BootstrapState>,
}

impl BootstrapContract {
    pub fn new(config: &BootstrapConfig) -> Self {
        Self {
            state: RwLock::new(BootstrapState {
                allowed_mr: config.allowed_mr,
                max_founders: config.max_founders,
                founder_count: 0,
                ended: false,
                founders: BTreeSet::new(),
                hardware_to_founder: HashMap::new(),
            }),
        }
    }

    /// Register `caller` as a founder. Returns `true` if this call closed the window.
    pub fn register_founder(
        &self,
        caller: Address,
        mr: Measurement,
        hardware_id: HardwareId,
    ) -> GovernanceResult<bool> {
        let mut state = self.state.write();
        if state.ended {
            return Err(GovernanceError::BootstrapEnded);
        }
        if state.founder_count >= state.max_founders {
            state.ended = true;
            return Err(GovernanceError::MaxFoundersReached(state.max_founders));
        }
        if mr != state.allowed_mr {
            return Err(GovernanceError::InvalidMr {
                expected: state.allowed_mr,
                actual: mr,
            });
        }
        if let Some(owner) = state.hardware_to_founder.get(&hardware_id) {
            return Err(GovernanceError::HardwareAlreadyRegistered(*owner));
        }
        if state.founders.contains(&caller) {
            return Err(GovernanceError::FounderAlreadyRegistered(caller));
        }

        state.founders.insert(caller);
        state.hardware_to_founder.insert(hardware_id, caller);
        state.founder_count += 1;
        if state.founder_count >= state.max_founders {
            state.ended = true;
        }
        info!(
            founder = %hex::encode(caller),
            count = state.founder_count,
            max = state.max_founders,
            ended = state.ended,
            "[ec-02] founder registered"
        );
        Ok(state.ended)
    }

    pub fn is_ended(&self) -> bool {
        self.state.read().ended
    }

    pub fn allowed_mr(&self) -> Measurement {
        self.state.read().allowed_mr
    }

    pub fn founders(&self) -> Vec<Address> {
        self.state.read().founders.iter().copied().collect()
    }

    pub fn founder_hardware(&self) -> Vec<(HardwareId, Address)> {
        self.state
            .read()
            .hardware_to_founder
            .iter()
            .map(|(hw, addr)| (*hw, *addr))
            .collect()
    }

    pub fn state(&self) -> BootstrapState {
        self.state.read().clone()
    }
}
