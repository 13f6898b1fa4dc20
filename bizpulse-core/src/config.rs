//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/bizpulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/bizpulse/` (~/.config/bizpulse/)
//! - Data: `$XDG_DATA_HOME/bizpulse/` (~/.local/share/bizpulse/)
//! - State/Logs: `$XDG_STATE_HOME/bizpulse/` (~/.local/state/bizpulse/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Metric computation settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings that change how metrics are derived from raw records.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Expense category counted as marketing spend (CAC, CPL, ROMI)
    #[serde(default = "default_marketing_category")]
    pub marketing_category: String,

    /// Expense category subtracted for gross margin
    #[serde(default = "default_salary_category")]
    pub salary_category: String,

    /// Ratings at or above this value count as positive for CSAT
    #[serde(default = "default_positive_rating_threshold")]
    pub positive_rating_threshold: f64,

    /// Divisor converting lifespan days to months
    #[serde(default = "default_days_per_month")]
    pub days_per_month: f64,

    /// Trailing window used by gig/source analytics when no range is given
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            marketing_category: default_marketing_category(),
            salary_category: default_salary_category(),
            positive_rating_threshold: default_positive_rating_threshold(),
            days_per_month: default_days_per_month(),
            default_window_days: default_window_days(),
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.days_per_month.is_nan() || self.days_per_month <= 0.0 {
            return Err(Error::Config(
                "analytics.days_per_month must be positive".to_string(),
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.default_window_days) {
            return Err(Error::Config(format!(
                "analytics.default_window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if !(0.0..=5.0).contains(&self.positive_rating_threshold) {
            return Err(Error::Config(
                "analytics.positive_rating_threshold must be between 0 and 5".to_string(),
            ));
        }
        Ok(())
    }
}

/// Longest trailing window gig/source analytics accept (ten years).
pub const MAX_WINDOW_DAYS: u32 = 3660;

fn default_marketing_category() -> String {
    "Marketing".to_string()
}

fn default_salary_category() -> String {
    "Salary".to_string()
}

fn default_positive_rating_threshold() -> f64 {
    4.0
}

fn default_days_per_month() -> f64 {
    30.44
}

fn default_window_days() -> u32 {
    30
}

/// Store location override
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (defaults to the XDG data directory)
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.analytics.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/bizpulse/config.toml` (~/.config/bizpulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("bizpulse").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/bizpulse/` (~/.local/share/bizpulse/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("bizpulse")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/bizpulse/` (~/.local/state/bizpulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("bizpulse")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/bizpulse/data.db` (~/.local/share/bizpulse/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Database path honoring the `[database] path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Directory holding the daily log files
    ///
    /// `$XDG_STATE_HOME/bizpulse/` (~/.local/state/bizpulse/)
    pub fn log_dir() -> PathBuf {
        Self::state_dir()
    }
}
