//! Terraform driver error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("terraform not found. Please install: https://developer.hashicorp.com/terraform/install")]
    TerraformNotFound,

    #[error("No Terraform configuration (*.tf) in {0}")]
    NoConfiguration(PathBuf),

    #[error("terraform {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] vmflow_core::CoreError),
}

impl TerraformError {
    pub(crate) fn failed(command: &str, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            stderr: stderr.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerraformError>;
