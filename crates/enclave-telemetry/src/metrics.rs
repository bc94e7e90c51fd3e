//! Prometheus registry shared by every Enclave-Chain crate.
//!
//! Metric names follow `ec_<area>_<metric>[_unit]`. Crates that define their
//! own collectors (behind their `metrics` feature) add them here through
//! [`register_collector`] so a single scrape exposes everything.

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, CounterVec, Encoder, Gauge, Histogram, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Current canonical chain height
    pub static ref CHAIN_HEIGHT: IntGauge = IntGauge::new(
        "ec_chain_height",
        "Height of the current canonical head"
    ).expect("metric creation failed");

    /// Measurements currently allowed by the whitelist
    pub static ref WHITELIST_ALLOWED: IntGauge = IntGauge::new(
        "ec_whitelist_allowed_measurements",
        "Number of active or approved enclave measurements"
    ).expect("metric creation failed");

    /// Active validators across both chambers
    pub static ref ACTIVE_VALIDATORS: Gauge = Gauge::new(
        "ec_validators_active",
        "Number of active validators"
    ).expect("metric creation failed");

    /// Subsystem errors by kind
    pub static ref SUBSYSTEM_ERRORS: CounterVec = CounterVec::new(
        Opts::new("ec_subsystem_errors_total", "Errors by subsystem and kind"),
        &["subsystem", "kind"]
    ).expect("metric creation failed");
}

/// Handle proving the core metrics were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    _private: (),
}

/// Register the core metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn Collector>> = vec![
        Box::new(CHAIN_HEIGHT.clone()),
        Box::new(WHITELIST_ALLOWED.clone()),
        Box::new(ACTIVE_VALIDATORS.clone()),
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ];
    for metric in metrics {
        register_collector(metric)?;
    }
    Ok(MetricsHandle { _private: () })
}

/// Add a collector to the global registry.
///
/// Registering the same collector twice is reported as `MetricsInit`.
pub fn register_collector(collector: Box<dyn Collector>) -> Result<(), TelemetryError> {
    REGISTRY
        .register(collector)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Count an error by subsystem tag and snake-case kind.
pub fn record_error(subsystem: &str, kind: &str) {
    SUBSYSTEM_ERRORS.with_label_values(&[subsystem, kind]).inc();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
