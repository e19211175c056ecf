//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device connection configuration
    pub device: DeviceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Monitor output configuration
    pub monitor: MonitorConfig,
}

impl Config {
    /// Check values that would only fail later, at connect time.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate(0));
        }
        if let Some((platform, _)) = self
            .device
            .identifiers
            .iter()
            .find(|(_, identifier)| identifier.trim().is_empty())
        {
            return Err(ConfigError::EmptyIdentifier {
                platform: platform.clone(),
            });
        }
        Ok(())
    }
}

/// Device connection section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Baud rate used for raw-mode configuration
    pub baud_rate: u32,
    /// Connection identifier per platform tag, e.g. `linux = "/dev/ttyACM0"`
    pub identifiers: HashMap<String, String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            identifiers: HashMap::from([("linux".to_string(), "/dev/ttyACM0".to_string())]),
        }
    }
}

impl DeviceConfig {
    /// Identifier configured for `platform`, if any.
    pub fn identifier_for(&self, platform: &str) -> Option<&str> {
        self.identifiers.get(platform).map(String::as_str)
    }

    /// Set the identifier for `platform`, replacing any previous one.
    pub fn set_identifier(&mut self, platform: impl Into<String>, identifier: impl Into<String>) {
        self.identifiers.insert(platform.into(), identifier.into());
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// How the monitor prints received data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy UTF-8 text
    #[default]
    Text,
    /// Space-separated hex bytes
    Hex,
}

/// Monitor configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Output format for received bytes
    pub output: OutputFormat,
    /// Stop after this many successful reads
    pub max_reads: Option<u64>,
}
