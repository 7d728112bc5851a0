//! Infrastructure outputs

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known output keys exported by the provisioning configuration
pub mod keys {
    pub const PUBLIC_IP: &str = "public_ip";
    pub const WIREGUARD_IP: &str = "wireguard_ip";
    pub const TAILSCALE_IP: &str = "tailscale_ip";
    pub const WIREGUARD_PORT: &str = "wireguard_port";
    pub const WIREGUARD_SERVER_PUBLIC_KEY: &str = "wireguard_server_public_key";
    pub const WIREGUARD_CLIENT_PRIVATE_KEY: &str = "wireguard_client_private_key";
    pub const WIREGUARD_CLIENT_IP: &str = "wireguard_client_ip";
    pub const SSH_USER: &str = "ssh_user";
}

/// Key/value outputs read after a successful apply.
///
/// Treat as a snapshot: any later apply or destroy makes it stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureOutputs {
    values: BTreeMap<String, String>,
}

impl InfrastructureOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| CloudError::MissingOutput(key.to_string()))
    }

    pub fn public_ip(&self) -> Option<&str> {
        self.get(keys::PUBLIC_IP)
    }

    pub fn wireguard_ip(&self) -> Option<&str> {
        self.get(keys::WIREGUARD_IP)
    }

    pub fn tailscale_ip(&self) -> Option<&str> {
        self.get(keys::TAILSCALE_IP)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

impl FromIterator<(String, String)> for InfrastructureOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
