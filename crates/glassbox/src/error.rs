//! Error types for glassbox.
//!
//! This module defines all error types used throughout the glassbox crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for glassbox operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Registry Errors ===
    /// A setting was created and can no longer be changed.
    #[error("setting '{key}' is frozen and cannot be updated")]
    SettingFrozen {
        /// Key of the frozen setting.
        key: String,
    },

    /// A setting was requested that was never interned.
    #[error("setting '{key}' does not exist")]
    SettingMissing {
        /// Key that was looked up.
        key: String,
    },

    // === Ledger Errors ===
    /// Failed to open or create the run ledger database.
    #[error("failed to open run ledger at {path}: {source}")]
    LedgerOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A ledger query failed.
    #[error("ledger query failed: {0}")]
    LedgerQuery(#[from] rusqlite::Error),

    /// Failed to run ledger schema migrations.
    #[error("ledger migration failed: {message}")]
    LedgerMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Pipeline Errors ===
    /// A pattern supplied to the pipeline did not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The underlying error.
        #[source]
        source: regex::Error,
    },

    // === Demo Errors ===
    /// An unrecognized demo name was given.
    #[error("unknown demo '{name}', expected protocol, memory, cycles, retry, or pipeline")]
    UnknownDemo {
        /// The name as given.
        name: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for glassbox operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a frozen-setting error.
    #[must_use]
    pub fn setting_frozen(key: impl Into<String>) -> Self {
        Self::SettingFrozen { key: key.into() }
    }

    /// Create a missing-setting error.
    #[must_use]
    pub fn setting_missing(key: impl Into<String>) -> Self {
        Self::SettingMissing { key: key.into() }
    }

    /// Create an invalid-pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Create an unknown-demo error.
    #[must_use]
    pub fn unknown_demo(name: impl Into<String>) -> Self {
        Self::UnknownDemo { name: name.into() }
    }

    /// Check if this error is a rejected write to a frozen setting.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::SettingFrozen { .. })
    }

    /// Check if this error is a configuration problem (load or validation).
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigLoad(_) | Self::ConfigValidation { .. })
    }
}
