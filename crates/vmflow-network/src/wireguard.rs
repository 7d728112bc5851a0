//! wg-quick based tunnel driver

use crate::config::TunnelConfig;
use crate::driver::TunnelDriver;
use crate::error::{Result, TunnelError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vmflow_cloud::Readiness;
use vmflow_core::{CommandOutput, CommandRunner, Invocation, fs};

pub const DEFAULT_INTERFACE: &str = "wg0";

/// Messages meaning "there was nothing to bring down"
const ALREADY_DOWN: &[&str] = &["is not a WireGuard interface", "does not exist"];

/// Message meaning "there was no such route"
const NO_SUCH_ROUTE: &str = "No such process";

/// WireGuard tunnel managed through `wg-quick`
pub struct WireGuard {
    runner: Arc<dyn CommandRunner>,
    interface: String,
    config_dir: PathBuf,
    use_sudo: bool,
}

impl WireGuard {
    pub fn new(runner: Arc<dyn CommandRunner>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            interface: DEFAULT_INTERFACE.to_string(),
            config_dir: config_dir.into(),
            use_sudo: false,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Prefix privileged commands with `sudo`
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// `<config_dir>/<interface>.conf`; wg-quick derives the interface name
    /// from the file stem.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        let invocation = invocation.sudo_if(self.use_sudo);
        debug!("Running: {}", invocation.display());
        Ok(self.runner.run(&invocation).await?)
    }

    /// Argument identifying the tunnel to wg-quick: our config file when it
    /// exists, otherwise the bare interface name.
    fn quick_target(&self) -> String {
        let path = self.config_path();
        if path.exists() {
            path.display().to_string()
        } else {
            self.interface.clone()
        }
    }

    async fn remove_route(&self, cidr: &str) -> Result<()> {
        let output = self
            .run(Invocation::new("ip").args(["route", "del", cidr]))
            .await?;

        if output.success() {
            info!(route = %cidr, "Removed stale route");
            return Ok(());
        }
        if output.message().contains(NO_SUCH_ROUTE) {
            return Ok(());
        }
        Err(failed("ip route del", &output))
    }

    fn write_config(&self, path: &Path, config: &TunnelConfig) -> Result<()> {
        let rendered = config.render()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        fs::write_atomic_private(path, rendered.as_bytes())?;
        Ok(())
    }
}

fn failed(command: &str, output: &CommandOutput) -> TunnelError {
    TunnelError::CommandFailed {
        command: command.to_string(),
        stderr: output.message(),
    }
}

#[async_trait]
impl TunnelDriver for WireGuard {
    fn interface(&self) -> &str {
        &self.interface
    }

    async fn check(&self) -> Readiness {
        for tool in ["wg-quick", "wg"] {
            if !self.runner.is_installed(tool).await {
                return Readiness::failed(TunnelError::ToolNotFound(tool.to_string()).to_string());
            }
        }
        Readiness::ok(format!("wg-quick ({})", self.interface))
    }

    async fn bring_up(&self, config: &TunnelConfig) -> Result<()> {
        // Start from a clean slate whatever the previous run left behind
        self.teardown().await?;
        for cidr in &config.allowed_ips {
            self.remove_route(cidr).await?;
        }

        let path = self.config_path();
        self.write_config(&path, config)?;

        let output = self
            .run(Invocation::new("wg-quick").args(["up".to_string(), path.display().to_string()]))
            .await?;
        if !output.success() {
            return Err(failed("wg-quick up", &output));
        }

        info!(interface = %self.interface, endpoint = %config.endpoint, "Tunnel up");
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        let output = self
            .run(Invocation::new("wg-quick").args(["down".to_string(), self.quick_target()]))
            .await?;

        if output.success() {
            info!(interface = %self.interface, "Tunnel down");
            return Ok(());
        }

        let message = output.message();
        if ALREADY_DOWN.iter().any(|m| message.contains(m)) {
            debug!(interface = %self.interface, "Tunnel already down");
            return Ok(());
        }
        Err(failed("wg-quick down", &output))
    }

    async fn is_up(&self) -> Result<bool> {
        let output = self
            .run(Invocation::new("wg").args(["show", self.interface.as_str()]))
            .await?;
        Ok(output.success())
    }
}
