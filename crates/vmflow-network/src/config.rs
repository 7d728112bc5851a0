//! Tunnel configuration and rendering

use crate::error::{Result, TunnelError};
use serde::Serialize;
use tera::{Context, Tera};
use vmflow_cloud::InfrastructureOutputs;
use vmflow_cloud::outputs::keys;

pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_KEEPALIVE: u16 = 25;

const TEMPLATE: &str = r#"# Managed by vmflow. Regenerated on every `vmflow network`.
[Interface]
PrivateKey = {{ private_key }}
Address = {{ address }}

[Peer]
PublicKey = {{ peer_public_key }}
Endpoint = {{ endpoint }}
AllowedIPs = {{ allowed_ips | join(sep=", ") }}
PersistentKeepalive = {{ keepalive }}
"#;

/// Client side of the point-to-point tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelConfig {
    pub private_key: String,
    /// Client tunnel address in CIDR form
    pub address: String,
    pub peer_public_key: String,
    /// `host:port` of the server
    pub endpoint: String,
    /// Routes claimed by the interface
    pub allowed_ips: Vec<String>,
    pub keepalive: u16,
}

impl TunnelConfig {
    /// Build the client config from infrastructure outputs.
    pub fn from_outputs(outputs: &InfrastructureOutputs) -> Result<Self> {
        let require = |key: &str| {
            outputs
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| TunnelError::MissingOutput(key.to_string()))
        };

        let public_ip = require(keys::PUBLIC_IP)?;
        let server_ip = require(keys::WIREGUARD_IP)?;
        let port = outputs
            .get(keys::WIREGUARD_PORT)
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_LISTEN_PORT);

        Ok(Self {
            private_key: require(keys::WIREGUARD_CLIENT_PRIVATE_KEY)?,
            address: with_prefix(&require(keys::WIREGUARD_CLIENT_IP)?),
            peer_public_key: require(keys::WIREGUARD_SERVER_PUBLIC_KEY)?,
            endpoint: format!("{}:{}", public_ip, port),
            allowed_ips: vec![with_prefix(&server_ip)],
            keepalive: DEFAULT_KEEPALIVE,
        })
    }

    /// Render the `wg-quick` configuration file
    pub fn render(&self) -> Result<String> {
        let context = Context::from_serialize(self)?;
        Ok(Tera::one_off(TEMPLATE, &context, false)?)
    }
}

/// `10.8.0.1` -> `10.8.0.1/32`; addresses already in CIDR form are kept
fn with_prefix(address: &str) -> String {
    if address.contains('/') {
        address.to_string()
    } else {
        format!("{}/32", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs() -> InfrastructureOutputs {
        InfrastructureOutputs::new()
            .with(keys::PUBLIC_IP, "203.0.113.10")
            .with(keys::WIREGUARD_IP, "10.8.0.1")
            .with(keys::WIREGUARD_CLIENT_IP, "10.8.0.2")
            .with(keys::WIREGUARD_CLIENT_PRIVATE_KEY, "cHJpdmF0ZQ==")
            .with(keys::WIREGUARD_SERVER_PUBLIC_KEY, "cHVibGlj")
    }

    #[test]
    fn test_from_outputs_defaults_port() {
        let config = TunnelConfig::from_outputs(&outputs()).unwrap();
        assert_eq!(config.endpoint, "203.0.113.10:51820");
        assert_eq!(config.address, "10.8.0.2/32");
        assert_eq!(config.allowed_ips, vec!["10.8.0.1/32"]);
    }

    #[test]
    fn test_from_outputs_custom_port() {
        let config = TunnelConfig::from_outputs(
            &outputs().with(keys::WIREGUARD_PORT, "41194"),
        )
        .unwrap();
        assert_eq!(config.endpoint, "203.0.113.10:41194");
    }

    #[test]
    fn test_from_outputs_missing_key() {
        let partial = InfrastructureOutputs::new().with(keys::PUBLIC_IP, "203.0.113.10");
        let err = TunnelConfig::from_outputs(&partial).unwrap_err();
        assert!(matches!(err, TunnelError::MissingOutput(ref k) if k == "wireguard_ip"));
    }

    #[test]
    fn test_render() {
        let rendered = TunnelConfig::from_outputs(&outputs()).unwrap().render().unwrap();

        assert!(rendered.contains("PrivateKey = cHJpdmF0ZQ==\n"));
        assert!(rendered.contains("Address = 10.8.0.2/32\n"));
        assert!(rendered.contains("PublicKey = cHVibGlj\n"));
        assert!(rendered.contains("Endpoint = 203.0.113.10:51820\n"));
        assert!(rendered.contains("AllowedIPs = 10.8.0.1/32\n"));
        assert!(rendered.contains("PersistentKeepalive = 25\n"));
    }
}
