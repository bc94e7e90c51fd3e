//! # Consensus Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ec-03-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ec_blocks_verified_total` - headers that passed every check
//! - `ec_blocks_rejected_total{reason}` - rejected headers by error kind
//! - `ec_blocks_sealed_total` - blocks sealed locally
//! - `ec_reorgs_total` - reorgs handled
//! - `ec_reorg_depth` - depth of handled reorgs
//! - `ec_quote_verification_seconds` - quote verification latency
//! - `ec_chain_height` - shared gauge from `enclave-telemetry`
//!
//! Without the feature every function is a no-op.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref BLOCKS_VERIFIED: IntCounter = IntCounter::new(
        "ec_blocks_verified_total",
        "Headers accepted by verification"
    )
    .expect("Failed to create BLOCKS_VERIFIED metric");

    /// Rejected headers, labeled by error kind
    pub static ref BLOCKS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("ec_blocks_rejected_total", "Headers rejected by verification"),
        &["reason"]
    )
    .expect("Failed to create BLOCKS_REJECTED metric");

    pub static ref BLOCKS_SEALED: IntCounter = IntCounter::new(
        "ec_blocks_sealed_total",
        "Blocks sealed by this node"
    )
    .expect("Failed to create BLOCKS_SEALED metric");

    pub static ref REORGS: IntCounter = IntCounter::new("ec_reorgs_total", "Chain reorganizations handled")
        .expect("Failed to create REORGS metric");

    pub static ref REORG_DEPTH: Histogram = Histogram::with_opts(
        HistogramOpts::new("ec_reorg_depth", "Blocks dropped per reorganization")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 64.0])
    )
    .expect("Failed to create REORG_DEPTH metric");

    pub static ref QUOTE_VERIFICATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("ec_quote_verification_seconds", "Quote verification latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0])
    )
    .expect("Failed to create QUOTE_VERIFICATION metric");
}

/// Add the consensus collectors to the shared registry.
#[cfg(feature = "metrics")]
pub fn register() -> Result<(), enclave_telemetry::TelemetryError> {
    enclave_telemetry::register_collector(Box::new(BLOCKS_VERIFIED.clone()))?;
    enclave_telemetry::register_collector(Box::new(BLOCKS_REJECTED.clone()))?;
    enclave_telemetry::register_collector(Box::new(BLOCKS_SEALED.clone()))?;
    enclave_telemetry::register_collector(Box::new(REORGS.clone()))?;
    enclave_telemetry::register_collector(Box::new(REORG_DEPTH.clone()))?;
    enclave_telemetry::register_collector(Box::new(QUOTE_VERIFICATION.clone()))
}

#[cfg(feature = "metrics")]
pub fn record_verified() {
    BLOCKS_VERIFIED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_rejected(kind: &str) {
    BLOCKS_REJECTED.with_label_values(&[kind]).inc();
    enclave_telemetry::record_error(enclave_telemetry::SUBSYSTEM_CONSENSUS, kind);
}

#[cfg(feature = "metrics")]
pub fn record_sealed(height: u64) {
    BLOCKS_SEALED.inc();
    enclave_telemetry::CHAIN_HEIGHT.set(height as i64);
}

#[cfg(feature = "metrics")]
pub fn record_reorg(depth: usize) {
    REORGS.inc();
    REORG_DEPTH.observe(depth as f64);
}

/// Observes into `ec_quote_verification_seconds` when dropped.
#[cfg(feature = "metrics")]
pub fn quote_verification_timer() -> enclave_telemetry::metrics::HistogramTimer {
    enclave_telemetry::metrics::HistogramTimer::new(&QUOTE_VERIFICATION)
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_verified() {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejected(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_sealed(_height: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reorg(_depth: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn quote_verification_timer() {}
