//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Subsystem tag (`ec-01`, `ec-02`, `ec-03`), empty for the whole node
    pub subsystem_id: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Prometheus metrics port
    pub metrics_port: u16,

    /// Network identifier (mainnet, testnet, devnet)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "enclave-chain".to_string(),
            subsystem_id: String::new(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: 9100,
            network: "devnet".to_string(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: enclave-chain)
    /// - `EC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `EC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `EC_JSON_LOGS`: Enable JSON logs (default: true inside containers)
    /// - `EC_METRICS_PORT`: Prometheus metrics port (default: 9100)
    /// - `EC_NETWORK`: Network name (default: devnet)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            subsystem_id: defaults.subsystem_id,
            log_level: env::var("EC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: env_flag("EC_CONSOLE_OUTPUT").unwrap_or(defaults.console_output),
            json_logs: env_flag("EC_JSON_LOGS").unwrap_or(is_container),
            metrics_port: env::var("EC_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
            network: env::var("EC_NETWORK").unwrap_or(defaults.network),
        }
    }

    /// Service name including the subsystem tag.
    pub fn full_service_name(&self) -> String {
        if self.subsystem_id.is_empty() {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.subsystem_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "enclave-chain");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port, 9100);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_full_service_name() {
        let mut config = TelemetryConfig::default();
        assert_eq!(config.full_service_name(), "enclave-chain");

        config.subsystem_id = "ec-03".to_string();
        assert_eq!(config.full_service_name(), "enclave-chain-ec-03");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TelemetryConfig = serde_json::from_str(r#"{"json_logs": true}"#).unwrap();
        assert!(config.json_logs);
        assert_eq!(config.network, "devnet");
    }
}
