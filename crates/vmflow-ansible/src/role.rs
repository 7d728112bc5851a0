//! Service roles

use crate::error::AnsibleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vmflow_core::RunConfiguration;

/// A service role, deployed by the playbook role of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gateway,
    Database,
    Storage,
    App,
    Monitoring,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Gateway,
        Role::Database,
        Role::Storage,
        Role::App,
        Role::Monitoring,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Gateway => "gateway",
            Role::Database => "database",
            Role::Storage => "storage",
            Role::App => "app",
            Role::Monitoring => "monitoring",
        }
    }

    /// Roles deployed for `cfg`, in deployment order
    pub fn enabled(cfg: &RunConfiguration) -> Vec<Role> {
        Self::ALL
            .into_iter()
            .filter(|role| *role != Role::Monitoring || cfg.monitoring_enabled)
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AnsibleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AnsibleError::UnknownRole(s.to_string()))
    }
}
