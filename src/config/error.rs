//! Errors raised while loading, overriding, validating or saving a `Config`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `device.baud_rate` has no raw-mode speed (only zero is caught here;
    /// the transport rejects the rest at connect time).
    #[error("device.baud_rate {0} is not a usable baud rate")]
    InvalidBaudRate(u32),

    /// `device.identifiers.<platform>` is blank.
    #[error("device.identifiers.{platform} is empty")]
    EmptyIdentifier { platform: String },

    /// A `SERIAL_DEVICE_*` override could not be parsed.
    #[error("environment override {var}={value:?} rejected: {reason}")]
    InvalidOverride {
        var: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Whether the loaded values, rather than the file itself, are at fault.
    pub fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Self::InvalidBaudRate(_) | Self::EmptyIdentifier { .. } | Self::InvalidOverride { .. }
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
