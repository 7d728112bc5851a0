//! Infrastructure driver error types

use thiserror::Error;

/// Infrastructure driver errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Driver not ready: {0}")]
    NotReady(String),

    /// The backend rejected the configuration (credentials, resource spec, quota)
    #[error("Plan failed: {0}")]
    Plan(String),

    /// Provisioning failed partially or fully
    #[error("Apply failed: {0}")]
    Apply(String),

    /// Some resources could not be removed
    #[error("Destroy incomplete, {} resource(s) remain: {}", .remaining.len(), .remaining.join(", "))]
    Destroy {
        remaining: Vec<String>,
        message: String,
    },

    #[error("Required infrastructure output missing: {0}")]
    MissingOutput(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] vmflow_core::CoreError),
}

pub type Result<T> = std::result::Result<T, CloudError>;
