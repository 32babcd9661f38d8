//! Error types for divegps.
//!
//! This module defines the error type shared by the store, the configuration
//! layer, the location providers and the upload flows.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for divegps operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

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

    /// The destination URL or the user id needed to address an upload is not set.
    #[error("upload settings missing: {missing}")]
    MissingSettings {
        /// Which settings are missing.
        missing: String,
    },

    // === Flow Errors ===
    /// Another batch upload is already running against the same store.
    #[error("a batch upload is already in progress")]
    BatchInProgress,

    /// The user interrupted a flow that did not stop on its own.
    #[error("interrupted")]
    Interrupted,

    // === Location Errors ===
    /// The location provider could not deliver a fix.
    #[error("location provider '{provider}' failed: {message}")]
    LocationProvider {
        /// Name of the provider.
        provider: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for divegps operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a missing-settings error naming the absent keys.
    #[must_use]
    pub fn missing_settings(missing: impl Into<String>) -> Self {
        Self::MissingSettings {
            missing: missing.into(),
        }
    }

    /// Create a location provider error.
    #[must_use]
    pub fn location_provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::LocationProvider {
            provider,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Check if this error is a configuration fault for uploads.
    #[must_use]
    pub fn is_missing_settings(&self) -> bool {
        matches!(self, Self::MissingSettings { .. })
    }
}
