//! # Scanner Configuration
//!
//! Connection, transaction timing, motion and scan-routine settings, loaded
//! from a single TOML file.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyACM0"
//! baud = 115200
//!
//! [scan]
//! scan_feed_rate = 443.33
//! approach_y = 80.0
//! far_y = 650.0
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use yzscan_shared::config::Config;
//! let toml_str = r#"
//! [scan]
//! scan_feed_rate = 443.33
//! "#;
//! let config: Config = toml::from_str(toml_str).unwrap();
//! assert_eq!(config.scan.scan_feed_rate, 443.33);
//! assert_eq!(config.connection.baud, 115200);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Serial link settings. The wire profile is always 8N1.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Delay after opening while the controller reboots.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_baud(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
    #[serde(default = "default_transaction_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_transaction_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TransactionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionConfig {
    /// Feed rate (mm/min) attached to feed moves until changed.
    #[serde(default = "default_feed_rate")]
    pub default_feed_rate: f64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Arrival tolerance in mm. Zero keeps exact comparison.
    #[serde(default)]
    pub position_tolerance: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            default_feed_rate: default_feed_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            position_tolerance: 0.0,
        }
    }
}

impl MotionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_travel_feed_rate")]
    pub travel_feed_rate: f64,
    /// Tuned to the capture cadence of the camera.
    #[serde(default = "default_scan_feed_rate")]
    pub scan_feed_rate: f64,
    #[serde(default = "default_approach_y")]
    pub approach_y: f64,
    #[serde(default = "default_far_y")]
    pub far_y: f64,
    #[serde(default = "default_home_timeout_s")]
    pub home_timeout_s: u64,
    #[serde(default = "default_move_timeout_s")]
    pub move_timeout_s: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            travel_feed_rate: default_travel_feed_rate(),
            scan_feed_rate: default_scan_feed_rate(),
            approach_y: default_approach_y(),
            far_y: default_far_y(),
            home_timeout_s: default_home_timeout_s(),
            move_timeout_s: default_move_timeout_s(),
        }
    }
}

impl ScanConfig {
    pub fn home_timeout(&self) -> Duration {
        Duration::from_secs(self.home_timeout_s)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_s)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    /// Distance travelled per status query.
    #[serde(default = "default_sim_step_mm")]
    pub step_mm: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step_mm: default_sim_step_mm(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.baud == 0 {
            return Err(ConfigError::Invalid("connection.baud must be > 0".to_string()));
        }
        if self.transaction.timeout_ms == 0 {
            return Err(ConfigError::Invalid("transaction.timeout_ms must be > 0".to_string()));
        }
        let feeds = [
            ("motion.default_feed_rate", self.motion.default_feed_rate),
            ("scan.travel_feed_rate", self.scan.travel_feed_rate),
            ("scan.scan_feed_rate", self.scan.scan_feed_rate),
        ];
        for (name, value) in feeds {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be a positive number", name)));
            }
        }
        if !self.motion.position_tolerance.is_finite() || self.motion.position_tolerance < 0.0 {
            return Err(ConfigError::Invalid("motion.position_tolerance must be >= 0".to_string()));
        }
        if !self.scan.approach_y.is_finite() || !self.scan.far_y.is_finite() {
            return Err(ConfigError::Invalid("scan positions must be finite".to_string()));
        }
        if self.simulator.step_mm <= 0.0 {
            return Err(ConfigError::Invalid("simulator.step_mm must be > 0".to_string()));
        }
        Ok(())
    }
}

fn default_baud() -> u32 { 115200 }
fn default_settle_ms() -> u64 { 2000 }
fn default_transaction_timeout_ms() -> u64 { 3000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_feed_rate() -> f64 { 1000.0 }
fn default_travel_feed_rate() -> f64 { 2000.0 }
fn default_scan_feed_rate() -> f64 { 443.33 }
fn default_approach_y() -> f64 { 80.0 }
fn default_far_y() -> f64 { 650.0 }
fn default_home_timeout_s() -> u64 { 90 }
fn default_move_timeout_s() -> u64 { 120 }
fn default_sim_step_mm() -> f64 { 50.0 }

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path.display(), e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}
