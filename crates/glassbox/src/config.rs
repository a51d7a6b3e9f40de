//! Configuration management for glassbox.
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

use crate::error::{Error, Result};
use crate::pipeline::{LogLevel, PipelinePlan};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "glassbox";

/// Default ledger database file name.
const DATABASE_FILE_NAME: &str = "runs.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GLASSBOX_`)
/// 2. TOML config file at `~/.config/glassbox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layout benchmark configuration.
    pub memory: MemoryConfig,
    /// Retry demo configuration.
    pub retry: RetryConfig,
    /// Pipeline demo configuration.
    pub pipeline: PipelineConfig,
    /// Run ledger configuration.
    pub ledger: LedgerConfig,
}

/// Layout benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Instances to build per layout.
    pub instances: usize,
}

/// Retry demo configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum calls to the endpoint, counting the first.
    pub attempts: u32,
    /// Pause between attempts in milliseconds.
    pub delay_ms: u64,
    /// Scripted connection drops before the endpoint answers.
    pub failures: u32,
}

/// Pipeline demo configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lines the synthetic source can produce.
    pub lines: usize,
    /// Matches to keep before stopping the source.
    pub preview: usize,
    /// Severity the level stage keeps (`OK`, `WARN`, or `ERROR`).
    pub level: String,
    /// Substring the search stage requires.
    pub needle: String,
}

/// Run ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path to the ledger database file.
    /// Defaults to `~/.local/share/glassbox/runs.db`
    pub database_path: Option<PathBuf>,
    /// Whether runs are recorded at all.
    pub enabled: bool,
    /// Maximum number of runs to retain.
    /// Set to 0 for unlimited.
    pub max_runs: usize,
    /// Maximum age of runs to retain in days.
    /// Set to 0 for unlimited.
    pub max_age_days: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            instances: 1_000_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1_000,
            failures: 2,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lines: 1_000_000,
            preview: 5,
            level: "OK".to_string(),
            needle: "logline".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            enabled: true,
            max_runs: 10_000,
            max_age_days: 90,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GLASSBOX_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("GLASSBOX_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
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
        if self.memory.instances == 0 {
            return Err(Error::ConfigValidation {
                message: "instances must be greater than 0".to_string(),
            });
        }

        if self.retry.attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "attempts must be greater than 0".to_string(),
            });
        }

        if self.pipeline.lines == 0 {
            return Err(Error::ConfigValidation {
                message: "lines must be greater than 0".to_string(),
            });
        }

        if self.pipeline.preview == 0 {
            return Err(Error::ConfigValidation {
                message: "preview must be greater than 0".to_string(),
            });
        }

        self.pipeline.level.parse::<LogLevel>()?;

        Ok(())
    }

    /// Get the ledger database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.ledger
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Build the retry policy the retry section describes.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    /// Build the pipeline plan the pipeline section describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured level does not parse.
    pub fn pipeline_plan(&self) -> Result<PipelinePlan> {
        Ok(PipelinePlan {
            lines: self.pipeline.lines,
            level: self.pipeline.level.parse()?,
            needle: self.pipeline.needle.clone(),
            pattern: None,
            dedup: false,
            preview: self.pipeline.preview,
        })
    }

    /// Get the maximum run age for pruning, `None` for unlimited.
    #[must_use]
    pub fn max_run_age(&self) -> Option<chrono::Duration> {
        if self.ledger.max_age_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.ledger.max_age_days)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.memory.instances, 1_000_000);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.pipeline.preview, 5);
        assert!(config.ledger.enabled);
    }

    #[test]
    fn test_default_retry_config() {
        let retry = RetryConfig::default();

        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay_ms, 1_000);
        assert_eq!(retry.failures, 2);
    }

    #[test]
    fn test_default_pipeline_config() {
        let pipeline = PipelineConfig::default();

        assert_eq!(pipeline.lines, 1_000_000);
        assert_eq!(pipeline.preview, 5);
        assert_eq!(pipeline.level, "OK");
        assert_eq!(pipeline.needle, "logline");
    }

    #[test]
    fn test_default_ledger_config() {
        let ledger = LedgerConfig::default();

        assert!(ledger.database_path.is_none());
        assert!(ledger.enabled);
        assert_eq!(ledger.max_runs, 10_000);
        assert_eq!(ledger.max_age_days, 90);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_instances() {
        let mut config = Config::default();
        config.memory.instances = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("instances"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.retry.attempts = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("attempts"));
    }

    #[test]
    fn test_validate_zero_lines() {
        let mut config = Config::default();
        config.pipeline.lines = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lines"));
    }

    #[test]
    fn test_validate_zero_preview() {
        let mut config = Config::default();
        config.pipeline.preview = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("preview"));
    }

    #[test]
    fn test_validate_unknown_level() {
        let mut config = Config::default();
        config.pipeline.level = "LOUD".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("LOUD"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("runs.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.ledger.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config::default();
        let policy = config.retry_policy();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_pipeline_plan_from_config() {
        let config = Config::default();
        let plan = config.pipeline_plan().unwrap();

        assert_eq!(plan.lines, 1_000_000);
        assert_eq!(plan.level, LogLevel::Ok);
        assert_eq!(plan.needle, "logline");
        assert!(plan.pattern.is_none());
        assert!(!plan.dedup);
    }

    #[test]
    fn test_pipeline_plan_level_is_case_insensitive() {
        let mut config = Config::default();
        config.pipeline.level = "error".to_string();

        let plan = config.pipeline_plan().unwrap();
        assert_eq!(plan.level, LogLevel::Error);
    }

    #[test]
    fn test_max_run_age_none_when_zero() {
        let mut config = Config::default();
        config.ledger.max_age_days = 0;

        assert!(config.max_run_age().is_none());
    }

    #[test]
    fn test_max_run_age_some_when_set() {
        let config = Config::default();

        assert_eq!(config.max_run_age(), Some(chrono::Duration::days(90)));
    }

    #[test]
    fn test_config_debug() {
        let config = Config::default();
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("Config"));
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("glassbox"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_data_dir() {
        let path = Config::default_data_dir();
        assert!(path.to_string_lossy().contains("glassbox"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_retry_config_serialize() {
        let retry = RetryConfig::default();
        let json = serde_json::to_string(&retry).unwrap();
        assert!(json.contains("delay_ms"));
    }

    #[test]
    fn test_retry_config_deserialize() {
        let json = r#"{"attempts": 5, "delay_ms": 50}"#;
        let retry: RetryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(retry.attempts, 5);
        assert_eq!(retry.delay_ms, 50);
        // Unlisted fields fall back to defaults.
        assert_eq!(retry.failures, 2);
    }

    #[test]
    fn test_pipeline_config_serialize() {
        let pipeline = PipelineConfig::default();
        let json = serde_json::to_string(&pipeline).unwrap();
        assert!(json.contains("needle"));
    }

    #[test]
    fn test_ledger_config_serialize() {
        let ledger = LedgerConfig::default();
        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("database_path"));
        assert!(json.contains("max_runs"));
    }
}
