//! Run configuration
//!
//! [`resolve`] merges the persisted `vmflow.env` file over built-in
//! [`Defaults`] and fills missing secrets, producing the immutable
//! [`RunConfiguration`] that every stage receives explicitly.

use crate::envfile::EnvFile;
use crate::error::{CoreError, Result};
use crate::secrets::{self, ALL_SECRETS, SecretSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod keys {
    pub const NETWORK_MODE: &str = "NETWORK_MODE";
    pub const MAIN_NETWORK: &str = "MAIN_NETWORK";
    pub const GATEWAY_MODE: &str = "GATEWAY_MODE";
    pub const ENABLE_SSL: &str = "ENABLE_SSL";
    pub const DOMAIN_NAME: &str = "DOMAIN_NAME";
    pub const SSL_EMAIL: &str = "SSL_EMAIL";
    pub const SSL_STAGING: &str = "SSL_STAGING";
    pub const ENABLE_MONITORING: &str = "ENABLE_MONITORING";
    pub const VM_CPU: &str = "VM_CPU";
    pub const VM_MEMORY: &str = "VM_MEMORY";
    pub const REQUIRED_ENDPOINTS: &str = "REQUIRED_ENDPOINTS";
    pub const SSH_PRIVATE_KEY: &str = "SSH_PRIVATE_KEY";
}

/// Which overlay networks the host joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    Wireguard,
    Tailscale,
    Both,
}

impl NetworkMode {
    pub fn includes_wireguard(self) -> bool {
        matches!(self, NetworkMode::Wireguard | NetworkMode::Both)
    }

    pub fn includes_tailscale(self) -> bool {
        matches!(self, NetworkMode::Tailscale | NetworkMode::Both)
    }
}

/// Address family used to reach the host from the operator machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainNetwork {
    Wireguard,
    Tailscale,
    Public,
}

impl MainNetwork {
    pub fn is_covered_by(self, mode: NetworkMode) -> bool {
        match self {
            MainNetwork::Wireguard => mode.includes_wireguard(),
            MainNetwork::Tailscale => mode.includes_tailscale(),
            MainNetwork::Public => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Gateway terminates HTTP(S) and reverse-proxies to the app
    Proxy,
    /// App ports are exposed directly
    Direct,
}

macro_rules! str_enum {
    ($ty:ident, $expected:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = &'static str;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err($expected),
                }
            }
        }
    };
}

str_enum!(NetworkMode, "one of wireguard, tailscale, both", {
    Wireguard => "wireguard",
    Tailscale => "tailscale",
    Both => "both",
});

str_enum!(MainNetwork, "one of wireguard, tailscale, public", {
    Wireguard => "wireguard",
    Tailscale => "tailscale",
    Public => "public",
});

str_enum!(GatewayMode, "one of proxy, direct", {
    Proxy => "proxy",
    Direct => "direct",
});

/// Generated credentials. `Debug` never prints the values.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub db_password: String,
    pub storage_secret_key: String,
    pub app_secret_key: String,
}

impl Secrets {
    fn slot_mut(&mut self, spec: SecretSpec) -> &mut String {
        match spec.key {
            k if k == secrets::DB_PASSWORD.key => &mut self.db_password,
            k if k == secrets::STORAGE_SECRET_KEY.key => &mut self.storage_secret_key,
            _ => &mut self.app_secret_key,
        }
    }

    pub fn get(&self, spec: SecretSpec) -> &str {
        match spec.key {
            k if k == secrets::DB_PASSWORD.key => &self.db_password,
            k if k == secrets::STORAGE_SECRET_KEY.key => &self.storage_secret_key,
            _ => &self.app_secret_key,
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("db_password", &"<redacted>")
            .field("storage_secret_key", &"<redacted>")
            .field("app_secret_key", &"<redacted>")
            .finish()
    }
}

/// Built-in values used when the persisted file does not set a key
#[derive(Debug, Clone)]
pub struct Defaults {
    pub network_mode: NetworkMode,
    pub main_network: MainNetwork,
    pub gateway_mode: GatewayMode,
    pub ssl_enabled: bool,
    pub ssl_staging: bool,
    pub monitoring_enabled: bool,
    pub vm_cpu: u32,
    pub vm_memory_gb: u32,
    pub required_endpoints: Vec<String>,
    pub ssh_private_key: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            network_mode: NetworkMode::Both,
            main_network: MainNetwork::Wireguard,
            gateway_mode: GatewayMode::Proxy,
            ssl_enabled: false,
            ssl_staging: false,
            monitoring_enabled: true,
            vm_cpu: 2,
            vm_memory_gb: 4,
            required_endpoints: vec![
                "gateway".to_string(),
                "app".to_string(),
                "database".to_string(),
            ],
            ssh_private_key: None,
        }
    }
}

/// Immutable settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub network_mode: NetworkMode,
    pub main_network: MainNetwork,
    pub gateway_mode: GatewayMode,
    pub ssl_enabled: bool,
    pub domain_name: Option<String>,
    pub ssl_email: Option<String>,
    pub ssl_staging: bool,
    pub monitoring_enabled: bool,
    pub vm_cpu: u32,
    pub vm_memory_gb: u32,
    pub required_endpoints: Vec<String>,
    pub ssh_private_key: Option<String>,
    pub secrets: Secrets,
}

impl RunConfiguration {
    /// SSL is active only when explicitly enabled *and* a domain is set.
    pub fn ssl_active(&self) -> bool {
        self.ssl_enabled && self.domain_name.is_some()
    }

    /// Cross-field checks that individual key parsing cannot catch
    pub fn validate(&self) -> Result<()> {
        if self.ssl_enabled && self.domain_name.is_none() {
            return Err(CoreError::Inconsistent(format!(
                "{}=true requires {} to be set",
                keys::ENABLE_SSL,
                keys::DOMAIN_NAME
            )));
        }
        self.validate_resources()
    }

    /// The subset of [`validate`](Self::validate) that teardown depends on.
    /// Service settings such as SSL do not matter for removing a VM.
    pub fn validate_resources(&self) -> Result<()> {
        if !self.main_network.is_covered_by(self.network_mode) {
            return Err(CoreError::Inconsistent(format!(
                "{}={} is not part of {}={}",
                keys::MAIN_NETWORK,
                self.main_network,
                keys::NETWORK_MODE,
                self.network_mode
            )));
        }
        if self.vm_cpu == 0 || self.vm_memory_gb == 0 {
            return Err(CoreError::Inconsistent(format!(
                "{} and {} must be greater than zero",
                keys::VM_CPU,
                keys::VM_MEMORY
            )));
        }
        Ok(())
    }

    /// Secret-free view for records and display
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            network_mode: self.network_mode,
            main_network: self.main_network,
            gateway_mode: self.gateway_mode,
            ssl_enabled: self.ssl_active(),
            domain_name: self.domain_name.clone(),
            ssl_email: self.ssl_email.clone(),
            ssl_staging: self.ssl_staging,
            monitoring_enabled: self.monitoring_enabled,
            vm_cpu: self.vm_cpu,
            vm_memory_gb: self.vm_memory_gb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub network_mode: NetworkMode,
    pub main_network: MainNetwork,
    pub gateway_mode: GatewayMode,
    pub ssl_enabled: bool,
    pub domain_name: Option<String>,
    pub ssl_email: Option<String>,
    pub ssl_staging: bool,
    pub monitoring_enabled: bool,
    pub vm_cpu: u32,
    pub vm_memory_gb: u32,
}

/// Output of [`resolve`]
#[derive(Debug, Clone)]
pub struct ResolvedEnvironment {
    pub config: RunConfiguration,
    /// Config keys of secrets generated during this resolution. They must be
    /// persisted before any stage that can fail.
    pub generated: Vec<&'static str>,
}

impl ResolvedEnvironment {
    /// `(key, value)` pairs that still need writing back
    pub fn pending_secrets(&self) -> Vec<(&'static str, &str)> {
        ALL_SECRETS
            .iter()
            .filter(|spec| self.generated.contains(&spec.key))
            .map(|spec| (spec.key, self.config.secrets.get(*spec)))
            .collect()
    }
}

/// Merge `persisted` over `defaults`.
pub fn resolve(defaults: &Defaults, persisted: Option<&EnvFile>) -> Result<ResolvedEnvironment> {
    let empty = EnvFile::new();
    let file = persisted.unwrap_or(&empty);

    let domain_name = file.get_non_empty(keys::DOMAIN_NAME).map(str::to_string);
    let ssl_email = file
        .get_non_empty(keys::SSL_EMAIL)
        .map(str::to_string)
        .or_else(|| domain_name.as_ref().map(|d| format!("admin@{}", d)));

    let required_endpoints = match file.get_non_empty(keys::REQUIRED_ENDPOINTS) {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => defaults.required_endpoints.clone(),
    };

    let mut secrets_out = Secrets {
        db_password: String::new(),
        storage_secret_key: String::new(),
        app_secret_key: String::new(),
    };
    let mut generated = Vec::new();
    for spec in ALL_SECRETS {
        let existing = file.get_non_empty(spec.key);
        let value = secrets::resolve_secret(spec, existing)?;
        if existing.is_none() {
            generated.push(spec.key);
        }
        *secrets_out.slot_mut(spec) = value;
    }

    let config = RunConfiguration {
        network_mode: parse_or(file, keys::NETWORK_MODE, defaults.network_mode)?,
        main_network: parse_or(file, keys::MAIN_NETWORK, defaults.main_network)?,
        gateway_mode: parse_or(file, keys::GATEWAY_MODE, defaults.gateway_mode)?,
        ssl_enabled: bool_or(file, keys::ENABLE_SSL, defaults.ssl_enabled)?,
        domain_name,
        ssl_email,
        ssl_staging: bool_or(file, keys::SSL_STAGING, defaults.ssl_staging)?,
        monitoring_enabled: bool_or(file, keys::ENABLE_MONITORING, defaults.monitoring_enabled)?,
        vm_cpu: number_or(file, keys::VM_CPU, defaults.vm_cpu)?,
        vm_memory_gb: number_or(file, keys::VM_MEMORY, defaults.vm_memory_gb)?,
        required_endpoints,
        ssh_private_key: file
            .get_non_empty(keys::SSH_PRIVATE_KEY)
            .map(str::to_string)
            .or_else(|| defaults.ssh_private_key.clone()),
        secrets: secrets_out,
    };

    Ok(ResolvedEnvironment { config, generated })
}

/// Load `path` if present and resolve. A missing file is only a warning.
pub fn resolve_from_path(defaults: &Defaults, path: &Path) -> Result<ResolvedEnvironment> {
    let file = EnvFile::load(path)?;
    if file.is_none() {
        tracing::warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
    }
    resolve(defaults, file.as_ref())
}

fn parse_or<T: FromStr<Err = &'static str>>(file: &EnvFile, key: &str, default: T) -> Result<T> {
    match file.get_non_empty(key) {
        Some(raw) => raw.parse().map_err(|expected| CoreError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        }),
        None => Ok(default),
    }
}

fn bool_or(file: &EnvFile, key: &str, default: bool) -> Result<bool> {
    match file.get_non_empty(key) {
        Some(raw) => parse_bool(raw).ok_or_else(|| CoreError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "a boolean (true/false)",
        }),
        None => Ok(default),
    }
}

fn number_or(file: &EnvFile, key: &str, default: u32) -> Result<u32> {
    match file.get_non_empty(key) {
        Some(raw) => raw.trim().parse().map_err(|_| CoreError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "a positive integer",
        }),
        None => Ok(default),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
