//! Configuration loading for the BeatChecker client
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (`BEATCHECKER_HOST`, `BEATCHECKER_PORT`,
//!    `BEATCHECKER_SAVE_DIR`, `BEATCHECKER_CONFIG`)
//! 3. TOML config file (`<config dir>/beatchecker/client.toml`)
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the client logs a warning and
//! starts with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Loopback host the background service binds by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the background service binds by default
pub const DEFAULT_PORT: u16 = 8765;

pub const ENV_HOST: &str = "BEATCHECKER_HOST";
pub const ENV_PORT: &str = "BEATCHECKER_PORT";
pub const ENV_SAVE_DIR: &str = "BEATCHECKER_SAVE_DIR";
pub const ENV_CONFIG: &str = "BEATCHECKER_CONFIG";

/// TOML file schema; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    pub service: ServiceSection,
    pub timeouts: TimeoutConfig,
    pub workflow: WorkflowSection,
    /// Where saved beats are written
    pub save_directory: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// `[service]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `[timeouts]` section, all values in milliseconds
///
/// Health and status checks are short; activation and analysis are long.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub health_ms: u64,
    pub analyze_ms: u64,
    pub download_ms: u64,
    pub license_status_ms: u64,
    pub license_activate_ms: u64,
    pub license_refresh_ms: u64,
    pub license_deactivate_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            health_ms: 2_000,
            analyze_ms: 300_000,
            download_ms: 120_000,
            license_status_ms: 5_000,
            license_activate_ms: 20_000,
            license_refresh_ms: 20_000,
            license_deactivate_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health_ms)
    }

    pub fn analyze(&self) -> Duration {
        Duration::from_millis(self.analyze_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn license_status(&self) -> Duration {
        Duration::from_millis(self.license_status_ms)
    }

    pub fn license_activate(&self) -> Duration {
        Duration::from_millis(self.license_activate_ms)
    }

    pub fn license_refresh(&self) -> Duration {
        Duration::from_millis(self.license_refresh_ms)
    }

    pub fn license_deactivate(&self) -> Duration {
        Duration::from_millis(self.license_deactivate_ms)
    }
}

/// `[workflow]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSection {
    /// Pause between a successful activation and the confirming status fetch
    pub license_settle_ms: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            license_settle_ms: 500,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub save_directory: Option<PathBuf>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeouts: TimeoutConfig,
    pub license_settle_delay: Duration,
    pub save_directory: PathBuf,
    pub logging: LoggingConfig,
    /// TOML file the values came from, if one was read
    pub config_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_parts(TomlConfig::default(), None)
    }
}

impl ClientConfig {
    /// Resolve configuration from CLI overrides, environment, TOML and defaults
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the TOML file exists but cannot be read or parsed
    /// - `BEATCHECKER_PORT` is set but is not a valid port
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let (toml_config, config_file) = match config_path {
            Some(path) => match load_toml_config(&path)? {
                Some(config) => (config, Some(path)),
                None => (TomlConfig::default(), None),
            },
            None => {
                warn!("Could not determine config directory, using defaults");
                (TomlConfig::default(), None)
            }
        };

        let mut config = Self::from_parts(toml_config, config_file);
        config.apply_env()?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Build from a parsed TOML file without consulting the environment
    pub fn from_parts(toml_config: TomlConfig, config_file: Option<PathBuf>) -> Self {
        Self {
            host: toml_config
                .service
                .host
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: toml_config.service.port.unwrap_or(DEFAULT_PORT),
            timeouts: toml_config.timeouts,
            license_settle_delay: Duration::from_millis(toml_config.workflow.license_settle_ms),
            save_directory: toml_config
                .save_directory
                .unwrap_or_else(default_save_directory),
            logging: toml_config.logging,
            config_file,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var(ENV_HOST) {
            if !host.trim().is_empty() {
                self.host = host.trim().to_string();
            }
        }

        if let Ok(port) = std::env::var(ENV_PORT) {
            self.port = port.trim().parse::<u16>().map_err(|e| {
                Error::Config(format!("{} must be a port number, got {:?}: {}", ENV_PORT, port, e))
            })?;
        }

        if let Ok(dir) = std::env::var(ENV_SAVE_DIR) {
            if !dir.trim().is_empty() {
                self.save_directory = PathBuf::from(dir);
            }
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.save_directory {
            self.save_directory = dir;
        }
    }

    /// Base URL of the background service, e.g. `http://127.0.0.1:8765`
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Read and parse a TOML config file
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(Some(config))
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beatchecker").join("client.toml"))
}

/// Default save directory: `~/Documents/BeatChecker`, falling back to `~/BeatChecker`
pub fn default_save_directory() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("BeatChecker"))
        .unwrap_or_else(|| PathBuf::from("BeatChecker"))
}
