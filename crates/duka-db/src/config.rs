//! # Ledger Configuration
//!
//! Configuration for the database and the ledger service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DUKA_DB_PATH=/srv/duka/duka.db                                     │
//! │     DUKA_COST_BASIS=current                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/duka.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.duka.ledger/duka.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     duka.db in the platform data dir, 5 attempts, snapshot costs       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # duka.toml
//! [database]
//! path = "/srv/duka/duka.db"
//! max_connections = 5
//!
//! [ledger]
//! max_transaction_attempts = 5
//! retry_backoff_ms = 10
//! low_stock_threshold = 5
//! top_n = 5
//! cost_basis = "snapshot"   # snapshot | current
//! ```

use duka_core::profit::DashboardSettings;
use duka_core::{CostBasis, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_TOP_N};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

const CONFIG_FILE_NAME: &str = "duka.toml";
const DATABASE_FILE_NAME: &str = "duka.db";

// =============================================================================
// Database Settings
// =============================================================================

/// The `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `None` means `duka.db` in the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// The `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Attempts per optimistic transaction before `TransactionFailed`.
    #[serde(default = "default_max_attempts")]
    pub max_transaction_attempts: u32,

    /// Backoff step between attempts; attempt `n` waits `n × step`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Stock at or below this (and above zero) counts as low.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,

    /// Length of ranked report lists.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Which cost price profit figures use.
    #[serde(default)]
    pub cost_basis: CostBasis,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_backoff() -> u64 {
    10
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_transaction_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            low_stock_threshold: default_low_stock_threshold(),
            top_n: default_top_n(),
            cost_basis: CostBasis::default(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (duka.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::InvalidConfig("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| DbError::InvalidConfig(e.to_string()))?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.ledger.max_transaction_attempts == 0 {
            return Err(DbError::InvalidConfig(
                "max_transaction_attempts must be greater than 0".into(),
            ));
        }

        if self.ledger.low_stock_threshold < 0 {
            return Err(DbError::InvalidConfig(
                "low_stock_threshold must not be negative".into(),
            ));
        }

        if self.ledger.top_n == 0 {
            return Err(DbError::InvalidConfig("top_n must be greater than 0".into()));
        }

        Ok(())
    }

    /// Applies `DUKA_*` overrides read through `lookup`.
    ///
    /// `load` passes the process environment; tests pass a map.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DUKA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("DUKA_DB_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DUKA_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("DUKA_MAX_TRANSACTION_ATTEMPTS") {
            match value.parse::<u32>() {
                Ok(n) => self.ledger.max_transaction_attempts = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DUKA_MAX_TRANSACTION_ATTEMPTS"),
            }
        }

        if let Some(value) = lookup("DUKA_RETRY_BACKOFF_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.ledger.retry_backoff_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid DUKA_RETRY_BACKOFF_MS"),
            }
        }

        if let Some(value) = lookup("DUKA_LOW_STOCK_THRESHOLD") {
            match value.parse::<i64>() {
                Ok(n) => self.ledger.low_stock_threshold = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DUKA_LOW_STOCK_THRESHOLD"),
            }
        }

        if let Some(value) = lookup("DUKA_TOP_N") {
            match value.parse::<usize>() {
                Ok(n) => self.ledger.top_n = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DUKA_TOP_N"),
            }
        }

        if let Some(value) = lookup("DUKA_COST_BASIS") {
            match value.parse::<CostBasis>() {
                Ok(basis) => {
                    debug!(basis = %basis, "Overriding cost basis from environment");
                    self.ledger.cost_basis = basis;
                }
                Err(e) => warn!(error = %e, "Ignoring invalid DUKA_COST_BASIS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "duka", "ledger")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Resolved database file: the configured path or the platform default.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "duka", "ledger")
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
        })
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }

    /// Retry policy for the ledger service.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.ledger.max_transaction_attempts,
            backoff: Duration::from_millis(self.ledger.retry_backoff_ms),
        }
    }

    /// Report settings for the dashboard and profit report.
    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            cost_basis: self.ledger.cost_basis,
            low_stock_threshold: self.ledger.low_stock_threshold,
            top_n: self.ledger.top_n,
            ..DashboardSettings::default()
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded retry with linear backoff for optimistic transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Attempt `n` (1-based) that conflicts sleeps `n × backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        LedgerConfig::default().retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.max_transaction_attempts, 5);
        assert_eq!(config.ledger.low_stock_threshold, 5);
        assert_eq!(config.ledger.cost_basis, CostBasis::Snapshot);
        assert!(config.database_path().ends_with("duka.db"));
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [ledger]
            cost_basis = "current"
            top_n = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.cost_basis, CostBasis::Current);
        assert_eq!(config.ledger.top_n, 3);
        assert_eq!(config.ledger.max_transaction_attempts, 5);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LedgerConfig::from_toml_str("[ledger]\ntop_n = \"many\"").unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();
        config.ledger.max_transaction_attempts = 0;
        assert!(config.validate().is_err());

        config.ledger.max_transaction_attempts = 3;
        config.ledger.low_stock_threshold = -1;
        assert!(config.validate().is_err());

        config.ledger.low_stock_threshold = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DUKA_DB_PATH", "/tmp/shop.db"),
            ("DUKA_COST_BASIS", "current"),
            ("DUKA_MAX_TRANSACTION_ATTEMPTS", "9"),
            ("DUKA_TOP_N", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path(), PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.ledger.cost_basis, CostBasis::Current);
        assert_eq!(config.retry_policy().max_attempts, 9);
        assert_eq!(config.ledger.top_n, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("duka.toml");

        let mut config = LedgerConfig::default();
        config.database.path = Some(dir.path().join("shop.db"));
        config.ledger.retry_backoff_ms = 25;
        config.save(Some(path.clone())).unwrap();

        let loaded = LedgerConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.retry_policy().delay_after(2), Duration::from_millis(50));
    }
}
