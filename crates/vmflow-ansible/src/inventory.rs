//! Inventory generation
//!
//! The inventory is a pure function of the infrastructure outputs and the
//! run configuration: equal inputs render byte-identical YAML, so the file
//! is only rewritten when something actually changed.

use crate::error::{AnsibleError, Result};
use crate::role::Role;
use crate::vars::{self, VarBag};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vmflow_cloud::InfrastructureOutputs;
use vmflow_cloud::outputs::keys;
use vmflow_core::{MainNetwork, RunConfiguration, fs};

/// Inventory name of the single combined host
pub const HOST_NAME: &str = "vmflow";

pub const DEFAULT_SSH_USER: &str = "root";

/// `~/.ssh/id_ed25519` when it exists
pub fn default_ssh_key() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("id_ed25519"))
        .filter(|path| path.is_file())
}

/// Connection parameters and address metadata of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEntry {
    pub ansible_host: String,
    pub ansible_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible_ssh_private_key_file: Option<String>,
    pub public_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wireguard_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tailscale_ip: Option<String>,
}

/// Rendered-inventory model
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    pub host: HostEntry,
    pub roles: Vec<Role>,
    pub vars: VarBag,
}

impl Inventory {
    /// Derive the inventory from `outputs` and `cfg`.
    pub fn generate(outputs: &InfrastructureOutputs, cfg: &RunConfiguration) -> Result<Self> {
        let require = |key: &str| {
            outputs
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| AnsibleError::MissingOutput(key.to_string()))
        };

        let public_ip = require(keys::PUBLIC_IP)?;
        let wireguard_ip = if cfg.network_mode.includes_wireguard()
            || cfg.main_network == MainNetwork::Wireguard
        {
            Some(require(keys::WIREGUARD_IP)?)
        } else {
            outputs.wireguard_ip().map(str::to_string)
        };
        let tailscale_ip = if cfg.main_network == MainNetwork::Tailscale {
            Some(require(keys::TAILSCALE_IP)?)
        } else {
            outputs.tailscale_ip().map(str::to_string)
        };

        let ansible_host = match cfg.main_network {
            MainNetwork::Wireguard => wireguard_ip.clone(),
            MainNetwork::Tailscale => tailscale_ip.clone(),
            MainNetwork::Public => Some(public_ip.clone()),
        }
        .ok_or_else(|| AnsibleError::MissingOutput(format!("{}_ip", cfg.main_network)))?;

        let host = HostEntry {
            ansible_host,
            ansible_user: outputs
                .get(keys::SSH_USER)
                .unwrap_or(DEFAULT_SSH_USER)
                .to_string(),
            ansible_ssh_private_key_file: cfg.ssh_private_key.clone(),
            public_ip,
            wireguard_ip,
            tailscale_ip,
        };

        Ok(Self {
            host,
            roles: Role::enabled(cfg),
            vars: vars::merge(cfg, &VarBag::new()),
        })
    }

    /// Address used for SSH
    pub fn connection_address(&self) -> &str {
        &self.host.ansible_host
    }

    /// Render as Ansible YAML. Keys are sorted, so output is stable.
    pub fn render(&self) -> Result<String> {
        let empty = BTreeMap::new();
        let children = self
            .roles
            .iter()
            .map(|role| {
                let hosts = BTreeMap::from([(HOST_NAME, &empty)]);
                (role.as_str(), Child { hosts })
            })
            .collect();

        let document = Document {
            all: Group {
                hosts: BTreeMap::from([(HOST_NAME, &self.host)]),
                children,
                vars: &self.vars,
            },
        };

        Ok(serde_yaml::to_string(&document)?)
    }

    /// Write to `path` only if the rendered content differs from what is
    /// there. Returns whether the file was written.
    ///
    /// The inventory carries secrets, so it is written owner-only.
    pub fn write_if_changed(&self, path: &Path) -> Result<bool> {
        let rendered = self.render()?;

        match std::fs::read(path) {
            Ok(existing) if existing == rendered.as_bytes() => {
                debug!("Inventory {} unchanged", path.display());
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs::write_atomic_private(path, rendered.as_bytes())?;
        info!(path = %path.display(), host = %self.host.ansible_host, "Inventory written");
        Ok(true)
    }
}

#[derive(Serialize)]
struct Document<'a> {
    all: Group<'a>,
}

#[derive(Serialize)]
struct Group<'a> {
    hosts: BTreeMap<&'a str, &'a HostEntry>,
    children: BTreeMap<&'a str, Child<'a>>,
    vars: &'a VarBag,
}

#[derive(Serialize)]
struct Child<'a> {
    hosts: BTreeMap<&'a str, &'a BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmflow_core::{Defaults, EnvFile, resolve};

    fn config(content: &str) -> RunConfiguration {
        resolve(&Defaults::default(), Some(&EnvFile::parse(content)))
            .unwrap()
            .config
    }

    fn outputs() -> InfrastructureOutputs {
        InfrastructureOutputs::new()
            .with(keys::PUBLIC_IP, "203.0.113.10")
            .with(keys::WIREGUARD_IP, "10.8.0.1")
            .with(keys::TAILSCALE_IP, "100.64.0.7")
    }

    const SECRETS: &str = "DB_PASSWORD=db\nSTORAGE_SECRET_KEY=st\nAPP_SECRET_KEY=app\n";

    #[test]
    fn test_main_network_selects_host() {
        let cases = [
            ("wireguard", "10.8.0.1"),
            ("tailscale", "100.64.0.7"),
            ("public", "203.0.113.10"),
        ];
        for (main, expected) in cases {
            let cfg = config(&format!("{}MAIN_NETWORK={}\n", SECRETS, main));
            let inventory = Inventory::generate(&outputs(), &cfg).unwrap();
            assert_eq!(inventory.connection_address(), expected, "main={}", main);
            // the other addresses stay as metadata
            assert_eq!(inventory.host.public_ip, "203.0.113.10");
            assert_eq!(inventory.host.tailscale_ip.as_deref(), Some("100.64.0.7"));
        }
    }

    #[test]
    fn test_missing_conditional_output() {
        let cfg = config(&format!("{}MAIN_NETWORK=tailscale\n", SECRETS));
        let only_public = InfrastructureOutputs::new()
            .with(keys::PUBLIC_IP, "203.0.113.10")
            .with(keys::WIREGUARD_IP, "10.8.0.1");

        let err = Inventory::generate(&only_public, &cfg).unwrap_err();
        assert!(matches!(err, AnsibleError::MissingOutput(ref k) if k == "tailscale_ip"));

        let err = Inventory::generate(&InfrastructureOutputs::new(), &cfg).unwrap_err();
        assert!(matches!(err, AnsibleError::MissingOutput(ref k) if k == "public_ip"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let cfg = config(SECRETS);
        let a = Inventory::generate(&outputs(), &cfg).unwrap().render().unwrap();
        let b = Inventory::generate(&outputs(), &cfg).unwrap().render().unwrap();
        assert_eq!(a, b);

        let doc: serde_yaml::Value = serde_yaml::from_str(&a).unwrap();
        let all = &doc["all"];
        assert_eq!(all["hosts"]["vmflow"]["ansible_host"].as_str(), Some("10.8.0.1"));
        assert_eq!(all["hosts"]["vmflow"]["ansible_user"].as_str(), Some("root"));
        assert!(all["children"]["database"]["hosts"]["vmflow"].is_mapping());
        assert!(all["children"]["monitoring"]["hosts"]["vmflow"].is_mapping());
        assert_eq!(all["vars"]["db_password"].as_str(), Some("db"));
    }

    #[test]
    fn test_ssh_user_and_key() {
        let cfg = config(&format!("{}SSH_PRIVATE_KEY=/keys/deploy\n", SECRETS));
        let inventory = Inventory::generate(
            &outputs().with(keys::SSH_USER, "ubuntu"),
            &cfg,
        )
        .unwrap();
        assert_eq!(inventory.host.ansible_user, "ubuntu");
        assert_eq!(
            inventory.host.ansible_ssh_private_key_file.as_deref(),
            Some("/keys/deploy")
        );
    }

    #[test]
    fn test_write_if_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vmflow/inventory.yml");
        let cfg = config(SECRETS);
        let inventory = Inventory::generate(&outputs(), &cfg).unwrap();

        assert!(inventory.write_if_changed(&path).unwrap());
        assert!(!inventory.write_if_changed(&path).unwrap());

        let changed = Inventory::generate(&outputs().with(keys::WIREGUARD_IP, "10.8.0.9"), &cfg)
            .unwrap();
        assert!(changed.write_if_changed(&path).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("10.8.0.9"));
    }
}
