//! Pipeline error taxonomy
//!
//! Every collaborator error is folded into one of these categories. Each
//! category owns a process exit code and a remediation hint for the operator.

use thiserror::Error;
use vmflow_ansible::AnsibleError;
use vmflow_cloud::CloudError;
use vmflow_core::CoreError;
use vmflow_network::TunnelError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A tool, credential, file or prior state is absent
    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("Secret error: {0}")]
    Secret(String),

    #[error("Plan failed: {0}")]
    Plan(String),

    #[error("Apply failed: {0}")]
    Apply(String),

    #[error("Destroy incomplete, {} resource(s) remain: {}", .remaining.len(), .message)]
    Destroy {
        remaining: Vec<String>,
        message: String,
    },

    #[error("Required infrastructure output missing: {0}")]
    MissingOutput(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Tunnel error: {0}")]
    Tunnel(String),

    #[error("Unreachable host(s): {}", .hosts.join(", "))]
    Connectivity { hosts: Vec<String>, message: String },

    #[error("Configuration apply failed: {message}")]
    ConfigurationApply {
        host: Option<String>,
        role: Option<String>,
        message: String,
    },

    #[error("Verification failed: {} endpoint(s) unhealthy: {}", .unhealthy.len(), .unhealthy.join(", "))]
    Verification { unhealthy: Vec<String> },

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub mod exit_code {
    pub const OK: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const PREREQUISITE: i32 = 10;
    pub const SECRET: i32 = 11;
    pub const PLAN: i32 = 20;
    pub const APPLY: i32 = 21;
    pub const DESTROY: i32 = 22;
    pub const INVENTORY: i32 = 30;
    pub const TUNNEL: i32 = 40;
    pub const CONNECTIVITY: i32 = 50;
    pub const CONFIGURATION: i32 = 60;
    pub const VERIFICATION: i32 = 70;
    pub const CANCELLED: i32 = 130;
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::PrerequisiteMissing(_) => exit_code::PREREQUISITE,
            PipelineError::Secret(_) => exit_code::SECRET,
            PipelineError::Plan(_) => exit_code::PLAN,
            PipelineError::Apply(_) => exit_code::APPLY,
            PipelineError::Destroy { .. } => exit_code::DESTROY,
            PipelineError::MissingOutput(_) | PipelineError::Inventory(_) => exit_code::INVENTORY,
            PipelineError::Tunnel(_) => exit_code::TUNNEL,
            PipelineError::Connectivity { .. } => exit_code::CONNECTIVITY,
            PipelineError::ConfigurationApply { .. } => exit_code::CONFIGURATION,
            PipelineError::Verification { .. } => exit_code::VERIFICATION,
            PipelineError::Cancelled => exit_code::CANCELLED,
            PipelineError::Internal(_) => exit_code::INTERNAL,
        }
    }

    /// The command an operator should run next
    pub fn remediation(&self) -> Option<String> {
        let hint = match self {
            PipelineError::PrerequisiteMissing(_) => {
                "Install the missing tool or fix vmflow.env, then re-run".to_string()
            }
            PipelineError::Secret(_) => {
                "Check that the config file is writable, then re-run".to_string()
            }
            PipelineError::Plan(_) => {
                "Check provider credentials and terraform/*.tf, then run `vmflow infra`".to_string()
            }
            PipelineError::Apply(_) => {
                "Run `vmflow infra` again; the next plan reconciles partial resources".to_string()
            }
            PipelineError::Destroy { .. } => {
                "Run `vmflow destroy --yes` again or remove the listed resources manually"
                    .to_string()
            }
            PipelineError::MissingOutput(key) => format!(
                "Export `{}` from terraform/outputs.tf, then run `vmflow infra`",
                key
            ),
            PipelineError::Inventory(_) => {
                "Run `vmflow infra` to regenerate .vmflow/inventory.yml".to_string()
            }
            PipelineError::Tunnel(_) => {
                "Run `vmflow network` (wg-quick needs root or --sudo)".to_string()
            }
            PipelineError::Connectivity { .. } => {
                "Check the tunnel with `vmflow connectivity`, then run `vmflow services`"
                    .to_string()
            }
            PipelineError::ConfigurationApply { role: Some(role), .. } => {
                format!("Fix the role, then run `vmflow services --role {}`", role)
            }
            PipelineError::ConfigurationApply { .. } => {
                "Fix the failing role, then run `vmflow services`".to_string()
            }
            PipelineError::Verification { .. } => {
                "Inspect endpoints with `vmflow health`".to_string()
            }
            PipelineError::Cancelled | PipelineError::Internal(_) => return None,
        };
        Some(hint)
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Secret { .. } | CoreError::Persist { .. } => {
                PipelineError::Secret(err.to_string())
            }
            CoreError::InvalidValue { .. }
            | CoreError::Inconsistent(_)
            | CoreError::ProgramNotFound(_) => PipelineError::PrerequisiteMissing(err.to_string()),
            CoreError::Io(_) => PipelineError::Internal(err.to_string()),
        }
    }
}

impl From<CloudError> for PipelineError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NotReady(msg) => PipelineError::PrerequisiteMissing(msg),
            CloudError::Plan(msg) => PipelineError::Plan(msg),
            CloudError::Apply(msg) => PipelineError::Apply(msg),
            CloudError::Destroy { remaining, message } => {
                PipelineError::Destroy { remaining, message }
            }
            CloudError::MissingOutput(key) => PipelineError::MissingOutput(key),
            CloudError::Core(e) => e.into(),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<TunnelError> for PipelineError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::MissingOutput(key) => PipelineError::MissingOutput(key),
            TunnelError::ToolNotFound(_) => PipelineError::PrerequisiteMissing(err.to_string()),
            other => PipelineError::Tunnel(other.to_string()),
        }
    }
}

impl From<AnsibleError> for PipelineError {
    fn from(err: AnsibleError) -> Self {
        match err {
            AnsibleError::MissingOutput(key) => PipelineError::MissingOutput(key),
            AnsibleError::ToolNotFound(_)
            | AnsibleError::InventoryNotFound(_)
            | AnsibleError::UnknownRole(_) => PipelineError::PrerequisiteMissing(err.to_string()),
            AnsibleError::Unreachable { hosts, message } => {
                PipelineError::Connectivity { hosts, message }
            }
            AnsibleError::PlaybookFailed {
                host,
                role,
                message,
            } => PipelineError::ConfigurationApply {
                host,
                role,
                message,
            },
            AnsibleError::Yaml(_) | AnsibleError::Core(_) => {
                PipelineError::Inventory(err.to_string())
            }
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
