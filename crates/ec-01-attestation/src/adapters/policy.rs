//! Fixed measurement policy.

use crate::ports::MeasurementPolicy;
use parking_lot::RwLock;
use shared_types::Measurement;
use std::collections::HashSet;

/// A mutable allow-set of measurements, independent of governance.
#[derive(Default)]
pub struct StaticMeasurementPolicy {
    allowed: RwLock<HashSet<Measurement>>,
}

impl StaticMeasurementPolicy {
    pub fn new(allowed: impl IntoIterator<Item = Measurement>) -> Self {
        Self {
            allowed: RwLock::new(allowed.into_iter().collect()),
        }
    }

    pub fn allow(&self, measurement: Measurement) {
        self.allowed.write().insert(measurement);
    }

    pub fn revoke(&self, measurement: &Measurement) {
        self.allowed.write().remove(measurement);
    }
}

impl MeasurementPolicy for StaticMeasurementPolicy {
    fn is_allowed(&self, measurement: &Measurement) -> bool {
        self.allowed.read().contains(measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_and_revoke() {
        let policy = StaticMeasurementPolicy::new([Measurement([1; 32])]);
        assert!(policy.is_allowed(&Measurement([1; 32])));
        assert!(!policy.is_allowed(&Measurement([2; 32])));

        policy.allow(Measurement([2; 32]));
        policy.revoke(&Measurement([1; 32]));
        assert!(policy.is_allowed(&Measurement([2; 32])));
        assert!(!policy.is_allowed(&Measurement([1; 32])));
    }
}
