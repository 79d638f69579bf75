//! Persistence error types

use thiserror::Error;

/// Persistence-specific errors
#[derive(Debug, Error)]
pub enum PersistError {
    /// Persister creation error
    #[error("failed to create persister '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Queue full - capture dropped
    #[error("queue full for persister '{name}', capture at {leader_ts_ns} dropped")]
    QueueFull { name: String, leader_ts_ns: i64 },

    /// Contract-level error
    #[error("persist error: {0}")]
    Contract(#[from] contracts::SyncError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    /// Create a persister creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
