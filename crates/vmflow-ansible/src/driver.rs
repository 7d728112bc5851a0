//! Configuration driver trait definition

use crate::error::Result;
use crate::role::Role;
use crate::vars::VarBag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vmflow_cloud::Readiness;

/// Push-based configuration management backend
#[async_trait]
pub trait ConfigDriver: Send + Sync {
    /// Returns the driver name (e.g., "ansible")
    fn name(&self) -> &str;

    /// Check that the tool and its playbook are present
    async fn check(&self) -> Readiness;

    /// Probe every inventory host. Any unreachable host is an error.
    async fn ping(&self, inventory: &Path) -> Result<PingReport>;

    /// Converge hosts to the desired configuration.
    ///
    /// `role` restricts the run to that role's hosts and tasks; `None` runs
    /// every role.
    async fn apply(&self, inventory: &Path, vars: &VarBag, role: Option<Role>)
    -> Result<PlayRecap>;
}

/// Per-host ping outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReport {
    pub reachable: Vec<String>,
    pub unreachable: Vec<String>,
}

impl PingReport {
    pub fn all_reachable(&self) -> bool {
        self.unreachable.is_empty() && !self.reachable.is_empty()
    }
}

/// Counters from the `PLAY RECAP` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecap {
    pub host: String,
    pub ok: u32,
    pub changed: u32,
    pub unreachable: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecap {
    pub hosts: Vec<HostRecap>,
}

impl PlayRecap {
    pub fn changed(&self) -> u32 {
        self.hosts.iter().map(|h| h.changed).sum()
    }

    /// First host with failed or unreachable tasks
    pub fn failing_host(&self) -> Option<&str> {
        self.hosts
            .iter()
            .find(|h| h.failed > 0 || h.unreachable > 0)
            .map(|h| h.host.as_str())
    }
}
