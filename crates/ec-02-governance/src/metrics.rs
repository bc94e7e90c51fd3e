//! # Governance Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ec-02-governance = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ec_governance_proposals_total{status}` - proposals by lifecycle transition
//! - `ec_governance_votes_total{chamber}` - votes recorded
//! - `ec_whitelist_allowed_measurements` - shared gauge from `enclave-telemetry`
//! - `ec_validators_active` - shared gauge from `enclave-telemetry`
//! - `ec_subsystem_errors_total{subsystem="ec-02"}` - governance errors by kind
//!
//! Without the feature every function is a no-op.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{IntCounterVec, Opts};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Proposal transitions, labeled by resulting status
    pub static ref PROPOSALS: IntCounterVec = IntCounterVec::new(
        Opts::new("ec_governance_proposals_total", "Proposal lifecycle transitions"),
        &["status"]
    )
    .expect("Failed to create PROPOSALS metric");

    /// Votes recorded, labeled by chamber
    pub static ref VOTES: IntCounterVec = IntCounterVec::new(
        Opts::new("ec_governance_votes_total", "Votes recorded"),
        &["chamber"]
    )
    .expect("Failed to create VOTES metric");
}

/// Add the governance collectors to the shared registry.
#[cfg(feature = "metrics")]
pub fn register() -> Result<(), enclave_telemetry::TelemetryError> {
    enclave_telemetry::register_collector(Box::new(PROPOSALS.clone()))?;
    enclave_telemetry::register_collector(Box::new(VOTES.clone()))
}

#[cfg(feature = "metrics")]
pub fn record_proposal(status: &str) {
    PROPOSALS.with_label_values(&[status]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_vote(chamber: &str) {
    VOTES.with_label_values(&[chamber]).inc();
}

#[cfg(feature = "metrics")]
pub fn set_whitelist_allowed(count: usize) {
    enclave_telemetry::WHITELIST_ALLOWED.set(count as i64);
}

#[cfg(feature = "metrics")]
pub fn set_active_validators(count: usize) {
    enclave_telemetry::ACTIVE_VALIDATORS.set(count as f64);
}

#[cfg(feature = "metrics")]
pub fn record_error(kind: &str) {
    enclave_telemetry::record_error(enclave_telemetry::SUBSYSTEM_GOVERNANCE, kind);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_proposal(_status: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_vote(_chamber: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_whitelist_allowed(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn set_active_validators(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_error(_kind: &str) {}
