//! Measurement policy seen by admission and consensus.

use crate::domain::{BootstrapContract, WhitelistManager};
use ec_01_attestation::MeasurementPolicy;
use shared_types::Measurement;
use std::sync::Arc;

/// Whitelist policy that also admits the bootstrap measurement while the
/// founder window is open.
pub struct GovernancePolicy {
    whitelist: Arc<WhitelistManager>,
    bootstrap: Arc<BootstrapContract>,
}

impl GovernancePolicy {
    pub fn new(whitelist: Arc<WhitelistManager>, bootstrap: Arc<BootstrapContract>) -> Self {
        Self {
            whitelist,
            bootstrap,
        }
    }
}

impl MeasurementPolicy for GovernancePolicy {
    fn is_allowed(&self, measurement: &Measurement) -> bool {
        if self.whitelist.is_allowed(measurement) {
            return true;
        }
        !self.bootstrap.is_ended() && *measurement == self.bootstrap.allowed_mr()
    }
}
