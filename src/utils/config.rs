//! Configuration management for the swarm courier.
//!
//! This module provides TOML-based configuration with support for multiple
//! configuration sources (default, file-based, environment variables) and
//! validation of configuration parameters.

use crate::network::SeedNode;
use crate::utils::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "courier.toml";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "COURIER";

/// Complete configuration for the courier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Storage-node network configuration
    pub network: NetworkConfig,
    /// Identity and message storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Storage-node network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Nodes queried for the initial node list
    pub seed_nodes: Vec<SeedNode>,
    /// Minimum seconds between node-list refreshes
    pub refresh_interval_secs: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Seconds a stored message lives on the network
    pub message_ttl_secs: u64,
    /// Upper bound on redirect candidates tried per store/retrieve
    pub max_redirects: usize,
}

/// Message store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-memory map, history is re-fetched after restart
    Memory,
    /// SQLite table that survives restarts
    Sqlite,
}

/// Identity and message storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for data storage
    pub data_dir: PathBuf,
    /// Seed file name, relative to `data_dir` unless absolute
    pub seed_file: PathBuf,
    /// Which message store to use
    pub backend: StoreBackend,
    /// SQLite database file name, relative to `data_dir` unless absolute
    pub database_file: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed_nodes: crate::defaults::seed_nodes(),
            refresh_interval_secs: crate::defaults::SNODE_REFRESH_INTERVAL_SECS,
            request_timeout_secs: crate::defaults::REQUEST_TIMEOUT_SECS,
            message_ttl_secs: crate::defaults::MESSAGE_TTL_SECS,
            max_redirects: crate::defaults::MAX_REDIRECTS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swarm-courier");

        Self {
            data_dir,
            seed_file: PathBuf::from("seed.dat"),
            backend: StoreBackend::Sqlite,
            database_file: PathBuf::from("messages.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Refresh interval as a duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageConfig {
    /// Resolved path of the identity seed file
    pub fn seed_path(&self) -> PathBuf {
        self.data_dir.join(&self.seed_file)
    }

    /// Resolved path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl CourierConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with multiple sources (default, file, environment)
    ///
    /// # Arguments
    ///
    /// * `config_file` - Optional path to configuration file
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file {
            if path.exists() {
                config = Self::from_file(path)?;
            } else {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
        } else {
            let default_locations = [
                PathBuf::from(DEFAULT_CONFIG_FILE),
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("swarm-courier")
                    .join(DEFAULT_CONFIG_FILE),
            ];

            if let Some(location) = default_locations.iter().find(|l| l.exists()) {
                config = Self::from_file(location)?;
            }
        }

        config = config.merge_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Apply `COURIER_*` environment overrides
    fn merge_from_env(mut self) -> Result<Self> {
        let refresh_var = format!("{}_NETWORK_REFRESH_INTERVAL_SECS", ENV_PREFIX);
        if let Ok(secs) = std::env::var(&refresh_var) {
            self.network.refresh_interval_secs =
                secs.parse().map_err(|_| ConfigError::InvalidValue {
                    field: refresh_var.clone(),
                    value: secs,
                })?;
        }

        if let Ok(level) = std::env::var(format!("{}_LOGGING_LEVEL", ENV_PREFIX)) {
            self.logging.level = level;
        }

        if let Ok(data_dir) = std::env::var(format!("{}_STORAGE_DATA_DIR", ENV_PREFIX)) {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        Ok(self)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.network.seed_nodes.is_empty() {
            return Err(ConfigError::MissingField {
                field: "network.seed_nodes".to_string(),
            }
            .into());
        }

        if let Some(seed) = self.network.seed_nodes.iter().find(|s| s.host.is_empty() || s.port == 0) {
            return Err(ConfigError::InvalidValue {
                field: "network.seed_nodes".to_string(),
                value: format!("{}:{}", seed.host, seed.port),
            }
            .into());
        }

        for (field, value) in [
            ("network.request_timeout_secs", self.network.request_timeout_secs),
            ("network.message_ttl_secs", self.network.message_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                }
                .into());
            }
        }

        if self.network.max_redirects == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.max_redirects".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    value: self.logging.level.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Ensure the data directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        let dir = &self.storage.data_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|_| ConfigError::DirectoryCreation {
                path: dir.display().to_string(),
            })?;
        }
        Ok(())
    }

    /// Get the configuration as a pretty-printed TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                reason: e.to_string(),
            }
            .into()
        })
    }
}
