//! Configuration driver error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnsibleError {
    #[error("{0} not found. Please install: pip install ansible-core")]
    ToolNotFound(String),

    #[error("Required infrastructure output missing: {0}")]
    MissingOutput(String),

    #[error("Inventory not found: {0}")]
    InventoryNotFound(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// One or more hosts did not answer the ping
    #[error("Unreachable host(s): {}", .hosts.join(", "))]
    Unreachable { hosts: Vec<String>, message: String },

    /// A playbook run failed on a host
    #[error("Configuration failed{}: {message}", location(.host, .role))]
    PlaybookFailed {
        host: Option<String>,
        role: Option<String>,
        message: String,
    },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] vmflow_core::CoreError),
}

fn location(host: &Option<String>, role: &Option<String>) -> String {
    match (host, role) {
        (Some(h), Some(r)) => format!(" on {} in role {}", h, r),
        (Some(h), None) => format!(" on {}", h),
        (None, Some(r)) => format!(" in role {}", r),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, AnsibleError>;
