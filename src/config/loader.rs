//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use crate::backend::current_platform;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_DEVICE";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial-device.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_DEVICE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_DEVICE_CONFIG` environment variable (explicit path)
    /// 2. `./serial-device.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override any config file values. The result is
    /// validated before it is returned.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if let Err(e) = apply_env_overrides(&mut config) {
            debug!("Ignoring environment override: {}", e);
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-device").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment variable overrides to the configuration.
///
/// - `SERIAL_DEVICE_BAUD_RATE=115200`
/// - `SERIAL_DEVICE_PATH=/dev/ttyUSB0` sets the identifier for the running platform
/// - `SERIAL_DEVICE_LOG_LEVEL=debug`
/// - `SERIAL_DEVICE_LOG_FORMAT=json`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let var = |key: &str| std::env::var(format!("{}_{}", ENV_PREFIX, key));

    if let Ok(val) = var("BAUD_RATE") {
        config.device.baud_rate = val.parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidOverride {
                var: format!("{}_BAUD_RATE", ENV_PREFIX),
                value: val.clone(),
                reason: e.to_string(),
            }
        })?;
    }
    if let Ok(val) = var("PATH") {
        config.device.set_identifier(current_platform(), val);
    }
    if let Ok(val) = var("LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Ok(val) = var("LOG_FORMAT") {
        config.logging.format = val.parse().map_err(|reason: String| ConfigError::InvalidOverride {
            var: format!("{}_LOG_FORMAT", ENV_PREFIX),
            value: val.clone(),
            reason,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    fn clear_env() {
        for key in ["BAUD_RATE", "PATH", "LOG_LEVEL", "LOG_FORMAT"] {
            env::remove_var(format!("{}_{}", ENV_PREFIX, key));
        }
        env::remove_var(CONFIG_PATH_ENV);
    }

    #[test]
    #[serial]
    fn test_default_loader() {
        clear_env();
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().device.baud_rate, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        clear_env();
        env::set_var("SERIAL_DEVICE_BAUD_RATE", "115200");
        env::set_var("SERIAL_DEVICE_PATH", "/dev/ttyUSB3");
        env::set_var("SERIAL_DEVICE_LOG_FORMAT", "json");

        let loader = ConfigLoader::with_defaults();
        let config = loader.config();
        assert_eq!(config.device.baud_rate, 115200);
        assert_eq!(
            config.device.identifier_for(current_platform()),
            Some("/dev/ttyUSB3")
        );
        assert_eq!(config.logging.format, LogFormat::Json);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_baud_is_reported() {
        clear_env();
        env::set_var("SERIAL_DEVICE_BAUD_RATE", "fast");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { ref value, .. } if value == "fast"));
        assert!(err.to_string().contains("SERIAL_DEVICE_BAUD_RATE"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device.toml");
        std::fs::write(
            &path,
            "[device]\nbaud_rate = 57600\n\n[device.identifiers]\nlinux = \"/dev/ttyS1\"\n",
        )
        .unwrap();

        let loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config().device.baud_rate, 57600);
        assert_eq!(loader.config().device.identifier_for("linux"), Some("/dev/ttyS1"));
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_load_from_rejects_invalid_values() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device.toml");
        std::fs::write(&path, "[device]\nbaud_rate = 0\n").unwrap();

        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaudRate(0)));
        assert!(err.is_invalid_value());
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("explicit.toml");
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        assert_eq!(resolve_config_path(), Some(path.clone()));
        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config().logging.level, "trace");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_save_and_reload() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut loader = ConfigLoader::with_defaults();
        loader.config_mut().device.baud_rate = 38400;
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap().into_config();
        assert_eq!(reloaded.device.baud_rate, 38400);
    }

    #[test]
    fn test_default_config_path_has_file_name() {
        if let Some(path) = get_default_config_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
