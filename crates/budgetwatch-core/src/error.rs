//! Error types for BudgetWatch

use thiserror::Error;

/// Result type alias using BudgetWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for BudgetWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// The delivery subsystem refused notification authorization
    #[error("Notification permission denied")]
    PermissionDenied,

    /// A notification template failed validation
    #[error("Invalid template: {}", errors.join("; "))]
    InvalidTemplate { errors: Vec<String> },

    /// The delivery subsystem failed to schedule a notification
    #[error("Scheduling failed: {0}")]
    SchedulingFailed(String),

    /// Unexpected failure while evaluating one budget
    #[error("Threshold detection failed for budget {budget_id}: {reason}")]
    ThresholdDetectionFailed { budget_id: String, reason: String },

    /// Persistent storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an evaluation failure for one budget
    pub fn detection_failed(budget_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ThresholdDetectionFailed {
            budget_id: budget_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
