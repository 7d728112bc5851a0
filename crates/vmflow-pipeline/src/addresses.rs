//! Resolved host addresses and the DNS records an operator should create

use serde::{Deserialize, Serialize};
use vmflow_cloud::InfrastructureOutputs;
use vmflow_core::{MainNetwork, RunConfiguration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    pub public_ip: Option<String>,
    pub wireguard_ip: Option<String>,
    pub tailscale_ip: Option<String>,
    /// Address used for SSH and internal endpoints
    pub connection: Option<String>,
    pub main_network: MainNetwork,
    pub domain_name: Option<String>,
    /// Base URL of the gateway
    pub gateway_url: Option<String>,
}

impl AddressBook {
    pub fn new(outputs: &InfrastructureOutputs, cfg: &RunConfiguration) -> Self {
        let public_ip = outputs.public_ip().map(str::to_string);
        let wireguard_ip = outputs.wireguard_ip().map(str::to_string);
        let tailscale_ip = outputs.tailscale_ip().map(str::to_string);

        let connection = match cfg.main_network {
            MainNetwork::Wireguard => wireguard_ip.clone(),
            MainNetwork::Tailscale => tailscale_ip.clone(),
            MainNetwork::Public => public_ip.clone(),
        };

        let scheme = if cfg.ssl_active() { "https" } else { "http" };
        let gateway_host = if cfg.ssl_active() {
            cfg.domain_name.clone()
        } else {
            public_ip.clone()
        };

        Self {
            gateway_url: gateway_host.map(|host| format!("{}://{}", scheme, host)),
            public_ip,
            wireguard_ip,
            tailscale_ip,
            connection,
            main_network: cfg.main_network,
            domain_name: cfg.domain_name.clone(),
        }
    }

    /// A records pointing the domain at the public address
    pub fn dns_records(&self) -> Vec<DnsRecord> {
        let (Some(domain), Some(ip)) = (&self.domain_name, &self.public_ip) else {
            return Vec::new();
        };
        vec![
            DnsRecord {
                name: domain.clone(),
                kind: "A",
                value: ip.clone(),
            },
            DnsRecord {
                name: format!("*.{}", domain),
                kind: "A",
                value: ip.clone(),
            },
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.public_ip.is_none() && self.wireguard_ip.is_none() && self.tailscale_ip.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    pub name: String,
    pub kind: &'static str,
    pub value: String,
}
