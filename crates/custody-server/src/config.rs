//! Server configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use custody_core::{Address, HeartbeatConfig, SECONDS_PER_DAY};
use custody_watch::WatchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Custody instance to deploy and operate
    pub custody: CustodySection,

    /// Monitoring thresholds
    #[serde(default)]
    pub watch: WatchSection,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (SQLite DB, state files)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Check interval in seconds (default: 6 hours)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Custody instance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodySection {
    /// Account that deploys the instance and becomes its first owner
    pub deployer: String,

    /// Initial heir; the deployer when unset
    #[serde(default)]
    pub heir: Option<String>,
}

impl CustodySection {
    pub fn deployer(&self) -> Result<Address> {
        parse_address("custody.deployer", &self.deployer)
    }

    /// Configured heir, falling back to the deployer
    pub fn initial_heir(&self) -> Result<Address> {
        match self.heir {
            Some(ref heir) => parse_address("custody.heir", heir),
            None => self.deployer(),
        }
    }
}

/// Monitoring thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    /// Warn when fewer days than this remain on the timelock
    #[serde(default = "default_warning_days")]
    pub warning_days: u64,

    /// Fraction of the timelock after which a ping is recommended
    #[serde(default = "default_checkin_threshold")]
    pub checkin_threshold: f64,

    /// Fraction of the timelock after which a ping is urgent
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            warning_days: default_warning_days(),
            checkin_threshold: default_checkin_threshold(),
            critical_threshold: default_critical_threshold(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_check_interval() -> u64 {
    21600 // 6 hours
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_warning_days() -> u64 {
    7
}

fn default_checkin_threshold() -> f64 {
    0.5
}

fn default_critical_threshold() -> f64 {
    0.9
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    let address: Address = value
        .parse()
        .with_context(|| format!("{} is not a valid address: {:?}", field, value))?;
    anyhow::ensure!(!address.is_zero(), "{} must not be the zero address", field);
    Ok(address)
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `CUSTODY_DATA_DIR`
    /// - `CUSTODY_CHECK_INTERVAL`
    /// - `CUSTODY_LOG_LEVEL`
    /// - `CUSTODY_DEPLOYER`
    /// - `HEIR_ADDRESS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CUSTODY_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CUSTODY_CHECK_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.check_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("CUSTODY_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("CUSTODY_DEPLOYER") {
            self.custody.deployer = v;
        }
        if let Ok(v) = std::env::var("HEIR_ADDRESS") {
            if !v.is_empty() {
                self.custody.heir = Some(v);
            }
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.custody.deployer()?;
        self.custody.initial_heir()?;

        // Check interval must be at least 60 seconds
        anyhow::ensure!(
            self.server.check_interval_secs >= 60,
            "server.check_interval_secs must be >= 60"
        );

        self.heartbeat_config()
            .validate()
            .context("Invalid [watch] thresholds")?;

        Ok(())
    }

    /// SQLite database holding the custody record and its history
    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("custody.db")
    }

    pub fn watch_state_path(&self) -> PathBuf {
        self.server.data_dir.join("watch_state.json")
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            checkin_threshold: self.watch.checkin_threshold,
            critical_threshold: self.watch.critical_threshold,
            poll_interval_secs: self.server.check_interval_secs,
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            state_path: self.watch_state_path(),
            poll_interval_secs: self.server.check_interval_secs,
            min_poll_interval_secs: 0, // Server manages its own interval via tokio::sleep
            warning_threshold_secs: self.watch.warning_days.saturating_mul(SECONDS_PER_DAY),
            heartbeat: self.heartbeat_config(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
