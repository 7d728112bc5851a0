use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid value for {key}: '{value}' (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),

    #[error("Secret generation failed for {name}: {message}")]
    Secret { name: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
