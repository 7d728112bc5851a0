//! Tunnel error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("{0} not found. Please install wireguard-tools")]
    ToolNotFound(String),

    #[error("Required infrastructure output missing: {0}")]
    MissingOutput(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to render tunnel config: {0}")]
    Render(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] vmflow_core::CoreError),
}

pub type Result<T> = std::result::Result<T, TunnelError>;
