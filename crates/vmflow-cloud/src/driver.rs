//! Infrastructure driver trait definition

use crate::error::Result;
use crate::outputs::InfrastructureOutputs;
use crate::plan::{DestroyReport, PlanHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vmflow_core::RunConfiguration;

/// Provisioning backend abstraction
///
/// `apply` and `destroy` are the only operations with real-world effect;
/// everything else is a read-only query.
#[async_trait]
pub trait InfraDriver: Send + Sync {
    /// Returns the driver name (e.g., "terraform")
    fn name(&self) -> &str;

    /// Check that the backend tool and its configuration are present
    async fn check(&self) -> Readiness;

    /// Whether a prior apply left durable state behind
    async fn state_exists(&self) -> Result<bool>;

    /// Compute a plan for the given variables
    async fn plan(&self, vars: &InfraVars) -> Result<PlanHandle>;

    /// Apply a plan. The plan artifact is discarded whatever the outcome.
    async fn apply(&self, plan: &PlanHandle) -> Result<InfrastructureOutputs>;

    /// Read a single output, `None` when it is not defined
    async fn output(&self, key: &str) -> Result<Option<String>>;

    /// Read all outputs of the current state
    async fn outputs(&self) -> Result<InfrastructureOutputs>;

    /// Best-effort teardown of every managed resource
    async fn destroy(&self, vars: &InfraVars) -> Result<DestroyReport>;

    /// Drop a plan that will not be applied
    fn discard(&self, plan: &PlanHandle) {
        if let Err(e) = vmflow_core::fs::remove_if_exists(&plan.path) {
            tracing::warn!("Failed to remove plan {}: {}", plan.path.display(), e);
        }
    }
}

/// Whether a collaborator tool is usable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    /// Whether the tool can be used
    pub ready: bool,

    /// Version or location information if available
    pub detail: Option<String>,

    /// What is missing, when not ready
    pub error: Option<String>,
}

impl Readiness {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            ready: true,
            detail: Some(detail.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ready: false,
            detail: None,
            error: Some(error.into()),
        }
    }
}

/// Input variables handed to the provisioning backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraVars {
    pub values: BTreeMap<String, String>,
}

impl InfraVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Sizing and feature toggles derived from the run configuration
    pub fn from_config(cfg: &RunConfiguration) -> Self {
        let mut vars = Self::new();
        vars.set("vm_cpu", cfg.vm_cpu);
        vars.set("vm_memory", cfg.vm_memory_gb);
        vars.set("network_mode", cfg.network_mode);
        vars.set("monitoring_enabled", cfg.monitoring_enabled);
        vars
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}
