//! Unified error types for the Convoy workspace.
//!
//! Each higher-level crate defines its own domain-specific error enum that wraps
//! these common variants when appropriate.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The container backend rejected or failed an operation.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A service finished successfully but asked the project to reload
    /// its configuration and run again.
    ///
    /// This is a coordination signal rather than a failure: the project
    /// consumes it and never reports it to the caller.
    #[error("restart execution")]
    RestartRequested,

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A YAML document could not be parsed.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl ConvoyError {
    /// Returns whether this error is the restart sentinel.
    #[must_use]
    pub const fn is_restart(&self) -> bool {
        matches!(self, Self::RestartRequested)
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConvoyError>;
