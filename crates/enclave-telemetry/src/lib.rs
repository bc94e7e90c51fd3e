//! # Enclave Telemetry
//!
//! Logging and metrics for Enclave-Chain nodes.
//!
//! ## Components
//!
//! - **Logs**: `tracing` + `tracing-subscriber` (pretty for development, JSON
//!   for log shippers), filtered by `EnvFilter`
//! - **Metrics**: a shared Prometheus registry the domain crates register into
//!
//! ## Usage
//!
//! ```rust,ignore
//! use enclave_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `enclave-chain` | Service name in logs |
//! | `EC_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `EC_JSON_LOGS` | `false` | JSON log lines |
//! | `EC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `EC_NETWORK` | `devnet` | Network label |

mod config;
pub mod logging;
pub mod metrics;
mod subscriber;

pub use config::TelemetryConfig;
pub use logging::{SUBSYSTEM_ATTESTATION, SUBSYSTEM_CONSENSUS, SUBSYSTEM_GOVERNANCE};
pub use metrics::{
    encode_metrics, record_error, register_collector, register_metrics, MetricsHandle,
    ACTIVE_VALIDATORS, CHAIN_HEIGHT, REGISTRY, SUBSYSTEM_ERRORS, WHITELIST_ALLOWED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed (usually: already set)
    #[error("Failed to initialize tracing subscriber: {0}")]
    Init(String),

    /// A collector could not be registered or encoded
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration (e.g. unparsable log filter)
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and register the core metrics.
///
/// Calling it a second time in the same process returns
/// [`TelemetryError::Init`] rather than panicking.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    subscriber::init_subscriber(&config)?;
    // Metrics may already be registered by an earlier embedder; logs still work.
    let metrics = register_metrics().ok();
    Ok(TelemetryGuard {
        _metrics: metrics,
        service: config.full_service_name(),
    })
}

/// Guard that keeps telemetry active for the lifetime of the node.
pub struct TelemetryGuard {
    _metrics: Option<MetricsHandle>,
    service: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service, "Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let first = init_telemetry(TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        });
        assert!(first.is_ok());
        let second = init_telemetry(TelemetryConfig::default());
        assert!(matches!(second, Err(TelemetryError::Init(_))));
    }
}
