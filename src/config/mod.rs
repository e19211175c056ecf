//! Configuration module for serial-device.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_DEVICE_CONFIG` environment variable (explicit path)
//! 2. `./serial-device.toml` (current directory)
//! 3. The platform config directory, e.g. `~/.config/serial-device/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `SERIAL_DEVICE_BAUD_RATE=115200`
//! - `SERIAL_DEVICE_PATH=/dev/ttyUSB0` (identifier for the running platform)
//! - `SERIAL_DEVICE_LOG_LEVEL=debug`
//! - `SERIAL_DEVICE_LOG_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_device::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Baud rate: {}", config.device.baud_rate);
//! # Ok::<(), serial_device::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, DeviceConfig, LogFormat, LoggingConfig, MonitorConfig, OutputFormat};
