//! Tunnel driver trait definition

use crate::config::TunnelConfig;
use crate::error::Result;
use async_trait::async_trait;
use vmflow_cloud::Readiness;

/// Overlay network bootstrapper
///
/// `bring_up` must be safe to call repeatedly: whatever state a previous
/// (possibly interrupted) run left behind, exactly one tunnel is up
/// afterwards.
#[async_trait]
pub trait TunnelDriver: Send + Sync {
    /// Returns the interface name (e.g., "wg0")
    fn interface(&self) -> &str;

    /// Check that the tunnel tools are installed
    async fn check(&self) -> Readiness;

    /// Tear down, clean stale routes, write config, bring up
    async fn bring_up(&self, config: &TunnelConfig) -> Result<()>;

    /// Bring the tunnel down. An interface that is already down is success.
    async fn teardown(&self) -> Result<()>;

    /// Whether the interface currently exists
    async fn is_up(&self) -> Result<bool>;
}
