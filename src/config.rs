//! Configuration management for Rclone Supervisor
//!
//! This module provides unified configuration management with first-run
//! initialization, multi-source loading, and zero-config defaults.
//!
//! Precedence, lowest first: built-in defaults, the config file, then the
//! `RCLONE_SUPERVISOR_*` environment variables (which may come from `.env`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{SupervisorConfig, TransferFlags};
use crate::constants::{env, supervisor, tool};
use crate::errors::{ConfigError, ConfigResult, ValidationError};

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "rclone-supervisor.toml";

/// Directory under the user config dir
const APP_DIR: &str = "rclone-supervisor";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Sync tool installation
    pub tool: ToolConfigToml,
    /// Supervisor timing
    pub supervisor: SupervisorConfigToml,
    /// Flags passed to every transfer
    pub transfer: TransferConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfigToml {
    /// rclone executable (searched on PATH when unset)
    pub rclone_path: Option<PathBuf>,
    /// rclone configuration file (rclone's default location when unset)
    pub config_path: Option<PathBuf>,
}

/// TOML-friendly supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfigToml {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub startup_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub termination_grace: Duration,
}

impl Default for SupervisorConfigToml {
    fn default() -> Self {
        Self {
            poll_interval: supervisor::POLL_INTERVAL,
            startup_timeout: supervisor::STARTUP_TIMEOUT,
            inactivity_timeout: supervisor::INACTIVITY_TIMEOUT,
            termination_grace: supervisor::TERMINATION_GRACE,
        }
    }
}

/// TOML-friendly transfer flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfigToml {
    /// Interval between stats lines, in rclone duration syntax
    pub stats_interval: String,
    pub transfers: u32,
    pub checkers: u32,
    /// Bandwidth limit in KB/s (0 = unlimited)
    pub bandwidth_limit_kb: u32,
}

impl Default for TransferConfigToml {
    fn default() -> Self {
        Self {
            stats_interval: tool::DEFAULT_STATS_INTERVAL.to_string(),
            transfers: tool::DEFAULT_TRANSFERS,
            checkers: tool::DEFAULT_CHECKERS,
            bandwidth_limit_kb: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            colored_output: true,
        }
    }
}

/// Resolved locations of the sync tool and its configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub rclone_path: PathBuf,
    pub config_path: PathBuf,
}

impl ToolConfig {
    /// Check that both the executable and its configuration exist
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.rclone_path.exists() {
            return Err(ValidationError::ExecutableNotFound {
                path: self.rclone_path.clone(),
            });
        }

        if !self.config_path.exists() {
            return Err(ValidationError::ConfigNotFound {
                path: self.config_path.clone(),
            });
        }

        Ok(())
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (ToolConfig, SupervisorConfig, TransferFlags) {
        (
            self.tool.to_runtime_config(),
            self.supervisor.to_runtime_config(),
            self.transfer.to_runtime_config(),
        )
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, working directory, user config dir)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            debug!("Loading config from: {}", path.display());
            config = Self::load_from_file(&path).await?;
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `RCLONE_SUPERVISOR_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(env::RCLONE_PATH).filter(|v| !v.trim().is_empty()) {
            debug!("rclone path overridden by {}", env::RCLONE_PATH);
            self.tool.rclone_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup(env::CONFIG_PATH).filter(|v| !v.trim().is_empty()) {
            debug!("rclone config overridden by {}", env::CONFIG_PATH);
            self.tool.config_path = Some(PathBuf::from(path));
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.transfer.transfers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.transfers".to_string(),
                value: "0".to_string(),
                reason: "At least one transfer is required".to_string(),
            });
        }

        if self.transfer.checkers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.checkers".to_string(),
                value: "0".to_string(),
                reason: "At least one checker is required".to_string(),
            });
        }

        if let Err(e) = humantime::parse_duration(&self.transfer.stats_interval) {
            return Err(ConfigError::InvalidValue {
                field: "transfer.stats_interval".to_string(),
                value: self.transfer.stats_interval.clone(),
                reason: e.to_string(),
            });
        }

        if let Err(reason) = self.supervisor.to_runtime_config().validate() {
            return Err(ConfigError::InvalidValue {
                field: "supervisor".to_string(),
                value: format!("{:?}", self.supervisor),
                reason,
            });
        }

        Ok(())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and returns its path
    pub async fn initialize_first_run() -> ConfigResult<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");
        Self::write_default_config(&config_path).await?;
        Ok(Some(config_path))
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default_config(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Ok(user_path) = Self::get_default_config_path() {
            search_paths.push(user_path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Rclone Supervisor Configuration
# You can customize any of these settings to suit your needs.

[tool]
# rclone executable; searched on PATH when unset
# rclone_path = "/usr/local/bin/rclone"

# rclone configuration file; rclone's default location when unset
# config_path = "/home/me/.config/rclone/rclone.conf"

[supervisor]
# How often the transfer is checked
poll_interval = "{}"
# Warn when no progress has been reported after this long
startup_timeout = "{}"
# Fail the transfer after this long without any output
inactivity_timeout = "{}"
# Time a stopped transfer gets before it is killed
termination_grace = "{}"

[transfer]
stats_interval = "{}"
transfers = {}
checkers = {}
# KB/s, 0 = unlimited
bandwidth_limit_kb = 0

[logging]
level = "warn"  # error, warn, info, debug, trace
colored_output = true
"#,
            humantime::format_duration(supervisor::POLL_INTERVAL),
            humantime::format_duration(supervisor::STARTUP_TIMEOUT),
            humantime::format_duration(supervisor::INACTIVITY_TIMEOUT),
            humantime::format_duration(supervisor::TERMINATION_GRACE),
            tool::DEFAULT_STATS_INTERVAL,
            tool::DEFAULT_TRANSFERS,
            tool::DEFAULT_CHECKERS,
        )
    }
}

impl ToolConfigToml {
    /// Convert to runtime ToolConfig, filling unset paths with defaults
    pub fn to_runtime_config(&self) -> ToolConfig {
        ToolConfig {
            rclone_path: self
                .rclone_path
                .clone()
                .unwrap_or_else(default_rclone_path),
            config_path: self
                .config_path
                .clone()
                .unwrap_or_else(default_rclone_config_path),
        }
    }
}

impl SupervisorConfigToml {
    /// Convert to runtime SupervisorConfig
    pub fn to_runtime_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_poll_interval(self.poll_interval)
            .with_startup_timeout(self.startup_timeout)
            .with_inactivity_timeout(self.inactivity_timeout)
            .with_termination_grace(self.termination_grace)
    }
}

impl TransferConfigToml {
    /// Convert to runtime TransferFlags
    pub fn to_runtime_config(&self) -> TransferFlags {
        TransferFlags {
            stats_interval: self.stats_interval.clone(),
            transfers: self.transfers,
            checkers: self.checkers,
            bandwidth_limit_kb: self.bandwidth_limit_kb,
        }
    }
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "rclone.exe"
    } else {
        "rclone"
    }
}

/// First `rclone` on PATH, or the bare name when none is found
fn default_rclone_path() -> PathBuf {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(executable_name()))
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or_else(|| PathBuf::from(executable_name()))
}

/// rclone's own default config location
fn default_rclone_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("rclone").join("rclone.conf"))
        .unwrap_or_else(|| PathBuf::from("rclone.conf"))
}
