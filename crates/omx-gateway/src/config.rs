//! Gateway configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// One throttle domain (usually one exchange line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleDomainConfig {
    /// Orders allowed per window.
    pub capacity: usize,
    /// Window length in milliseconds.
    #[serde(default = "default_throttle_window_ms")]
    pub window_ms: u64,
}

fn default_throttle_window_ms() -> u64 {
    1_000
}

/// Gateway service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Service name used in logs and thread names.
    #[serde(default = "default_name")]
    pub name: String,
    /// Initial purchasing power in integer notional units.
    pub purchasing_power: i64,
    /// Update-channel count; must be a power of two.
    #[serde(default = "default_num_channels")]
    pub num_channels: usize,
    /// First order sid handed out by the registry.
    #[serde(default = "default_start_order_sid")]
    pub start_order_sid: u32,
    /// Per-line throttle domains, indexed by `throttle_domain` on
    /// requests. At least one is required.
    pub throttle_domains: Vec<ThrottleDomainConfig>,
    /// Optional underlying-level throttle applied at buy admission.
    #[serde(default)]
    pub underlying_throttle: Option<ThrottleDomainConfig>,
    /// Admitted-request queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum orders batched per dispatch flush.
    #[serde(default = "default_max_batch_orders")]
    pub max_batch_orders: usize,
    /// Default request deadline when the caller gives none (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound on the per-child stop wait (ms).
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Bound on waiting for the recovery replay to drain (ms).
    #[serde(default = "default_recovery_drain_timeout_ms")]
    pub recovery_drain_timeout_ms: u64,
    /// Reject a cancel when one is already pending for the same order.
    #[serde(default = "default_true")]
    pub avoid_multiple_cancels: bool,
    /// Existing positions loaded at recovery exit, formatted
    /// `"instrumentSid,qty;instrumentSid,qty"`.
    #[serde(default)]
    pub existing_positions: Option<String>,
}

fn default_name() -> String {
    "omx-gateway".to_string()
}

fn default_num_channels() -> usize {
    16
}

fn default_start_order_sid() -> u32 {
    omx_registry::START_ORDER_SID_SEQUENCE
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_batch_orders() -> usize {
    1
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_recovery_drain_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            purchasing_power: 1_000_000_000,
            num_channels: default_num_channels(),
            start_order_sid: default_start_order_sid(),
            throttle_domains: vec![ThrottleDomainConfig {
                capacity: 8,
                window_ms: default_throttle_window_ms(),
            }],
            underlying_throttle: None,
            queue_capacity: default_queue_capacity(),
            max_batch_orders: default_max_batch_orders(),
            request_timeout_ms: default_request_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            recovery_drain_timeout_ms: default_recovery_drain_timeout_ms(),
            avoid_multiple_cancels: true,
            existing_positions: None,
        }
    }
}

impl GatewayConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.throttle_domains.is_empty() {
            return Err(GatewayError::Config(
                "at least one throttle domain is required".to_string(),
            ));
        }
        if !self.num_channels.is_power_of_two() {
            return Err(GatewayError::Config(format!(
                "num_channels must be a power of two, got {}",
                self.num_channels
            )));
        }
        if self.purchasing_power < 0 {
            return Err(GatewayError::Config(
                "purchasing_power must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let raw = r#"
            purchasing_power = 1000000

            [[throttle_domains]]
            capacity = 4
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.throttle_domains[0].capacity, 4);
        assert_eq!(config.throttle_domains[0].window_ms, 1_000);
        assert_eq!(config.num_channels, 16);
        assert!(config.avoid_multiple_cancels);
    }

    #[test]
    fn test_invalid_channel_count_rejected() {
        let config = GatewayConfig {
            num_channels: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_throttle_domains_rejected() {
        let config = GatewayConfig {
            throttle_domains: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
