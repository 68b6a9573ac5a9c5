//! Simulator configuration loading and validation.
//!
//! Settings come from an optional TOML file with kebab-case keys. Every key
//! has a default, so an empty file (or no file) gives the reference setup:
//! 100 kbps channel, 2 ms propagation delay, 1 s slots, 4 byte frames.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::simulation::{ChannelParameters, DroneSettings};

/// Error type for configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse TOML: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Shared medium parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ChannelConfig {
    pub bandwidth_bps: u64,
    pub propagation_delay_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bandwidth_bps: 100_000,
            propagation_delay_ms: 2,
        }
    }
}

/// Drone behavior. The ack timeout is off unless `ack-timeout-ms` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DroneConfig {
    pub slot_interval_ms: u64,
    pub data_payload_bytes: u32,
    pub ack_payload_bytes: u32,
    pub start_offset_ms: u64,
    pub start_jitter_ms: u64,
    pub ack_timeout_ms: Option<u64>,
    pub max_retries: u32,
    pub retry_jitter_ms: u64,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            slot_interval_ms: 1000,
            data_payload_bytes: 4,
            ack_payload_bytes: 4,
            start_offset_ms: 0,
            start_jitter_ms: 0,
            ack_timeout_ms: None,
            max_retries: 3,
            retry_jitter_ms: 0,
        }
    }
}

/// Fleet sizing and addressing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Smallest fleet, GCS included.
    pub min_nodes: u32,
    pub max_nodes: u32,
    /// Node `id` gets `address-base + id + 1`.
    pub address_base: Ipv4Addr,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            min_nodes: 5,
            max_nodes: 100,
            address_base: Ipv4Addr::new(10, 1, 1, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RunConfig {
    pub duration_ms: u64,
    /// Drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SimConfig {
    pub channel: ChannelConfig,
    pub drone: DroneConfig,
    pub fleet: FleetConfig,
    pub run: RunConfig,
}

impl SimConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .with_context(|| path.display().to_string())
            .map_err(|e| ConfigError::FileReadError(format!("{:#}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    /// Reject settings that would make the run meaningless.
    ///
    /// # Returns
    ///
    /// `Ok(())` if validation passes, `Err(String)` with error description if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.channel.bandwidth_bps == 0 {
            return Err("channel.bandwidth-bps must be positive".to_string());
        }
        if self.drone.slot_interval_ms == 0 {
            return Err("drone.slot-interval-ms must be positive".to_string());
        }
        if self.drone.data_payload_bytes == 0 || self.drone.ack_payload_bytes == 0 {
            return Err("drone payload sizes must be positive".to_string());
        }
        if self.drone.ack_timeout_ms == Some(0) {
            return Err("drone.ack-timeout-ms must be positive when set".to_string());
        }
        if self.fleet.min_nodes < 1 {
            return Err("fleet.min-nodes must be at least 1".to_string());
        }
        if self.fleet.min_nodes > self.fleet.max_nodes {
            return Err(format!(
                "fleet.min-nodes ({}) exceeds fleet.max-nodes ({})",
                self.fleet.min_nodes, self.fleet.max_nodes
            ));
        }
        if self.run.duration_ms == 0 {
            return Err("run.duration-ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn channel_parameters(&self) -> ChannelParameters {
        ChannelParameters {
            bandwidth_bps: self.channel.bandwidth_bps,
            propagation_delay: Duration::from_millis(self.channel.propagation_delay_ms),
        }
    }

    pub fn drone_settings(&self) -> DroneSettings {
        let drone = &self.drone;
        DroneSettings {
            slot_interval: Duration::from_millis(drone.slot_interval_ms),
            data_payload_bytes: drone.data_payload_bytes,
            ack_payload_bytes: drone.ack_payload_bytes,
            start_offset: Duration::from_millis(drone.start_offset_ms),
            start_jitter: Duration::from_millis(drone.start_jitter_ms),
            ack_timeout: drone.ack_timeout_ms.map(Duration::from_millis),
            max_retries: drone.max_retries,
            retry_jitter: Duration::from_millis(drone.retry_jitter_ms),
        }
    }

    pub fn horizon(&self) -> Duration {
        Duration::from_millis(self.run.duration_ms)
    }
}
