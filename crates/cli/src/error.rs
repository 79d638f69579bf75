//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration loading or validation error
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: contracts::SyncError,
    },

    /// Node execution error
    #[error("Node execution failed: {0}")]
    NodeExecution(#[from] anyhow::Error),

    /// Report serialization error
    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_load(path: impl Into<String>, source: contracts::SyncError) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
