//! Configuration management for kiddoz-enroll.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::catalog::{builtin_plans, Plan, PlanCatalog};
use crate::error::{Error, Result};
use crate::record::{is_valid_prefix, StudentIdGenerator, DEFAULT_STUDENT_ID_PREFIX};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "kiddoz";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "enrollments.db";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "KIDDOZ_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `KIDDOZ_`, sections separated by
///    `__`, e.g. `KIDDOZ_ENROLLMENT__COMMIT_TIMEOUT_MS`)
/// 2. TOML config file at `~/.config/kiddoz/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Enrollment configuration.
    pub enrollment: EnrollmentConfig,
    /// Plan catalog.
    pub catalog: CatalogConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/kiddoz/enrollments.db`
    pub database_path: Option<PathBuf>,
}

/// Enrollment commit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Prefix of generated student identifiers (1-4 uppercase letters).
    pub student_id_prefix: String,
    /// Bound on one persistence call in milliseconds.
    pub commit_timeout_ms: u64,
}

/// Plan catalog configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Offered plans, in display order.
    pub plans: Vec<Plan>,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            student_id_prefix: DEFAULT_STUDENT_ID_PREFIX.to_string(),
            commit_timeout_ms: 15_000,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            plans: builtin_plans(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `KIDDOZ_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::figment(config_path).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider chain used by [`load_from`](Self::load_from).
    #[must_use]
    pub fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_prefix(&self.enrollment.student_id_prefix) {
            return Err(Error::config(format!(
                "student_id_prefix must be 1-4 uppercase letters, got '{}'",
                self.enrollment.student_id_prefix
            )));
        }

        if self.enrollment.commit_timeout_ms == 0 {
            return Err(Error::config("commit_timeout_ms must be greater than 0"));
        }

        self.catalog().map(|_| ())
    }

    /// Build the plan catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured plan list is empty or has missing
    /// or duplicate ids.
    pub fn catalog(&self) -> Result<PlanCatalog> {
        PlanCatalog::new(self.catalog.plans.clone())
    }

    /// Generator for student identifiers with the configured prefix.
    #[must_use]
    pub fn student_ids(&self) -> StudentIdGenerator {
        StudentIdGenerator::new(self.enrollment.student_id_prefix.clone())
    }

    /// Get the commit timeout as a Duration.
    #[must_use]
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.enrollment.commit_timeout_ms)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
