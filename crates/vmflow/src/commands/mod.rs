pub mod addresses;
pub mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vmflow_ansible::{Ansible, default_ssh_key};
use vmflow_cloud_terraform::TerraformDriver;
use vmflow_core::{CommandRunner, Defaults, SystemRunner};
use vmflow_network::WireGuard;
use vmflow_pipeline::{Collaborators, NetProber, Orchestrator, Workspace};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Options shared by every command
pub struct Context {
    pub workspace: Workspace,
    pub sudo: bool,
}

impl Context {
    pub fn new(project_dir: PathBuf, config: Option<PathBuf>, sudo: bool) -> Self {
        let mut workspace = Workspace::new(project_dir);
        if let Some(config) = config {
            workspace = workspace.with_config(config);
        }
        Self { workspace, sudo }
    }

    /// Orchestrator wired to the real tools
    pub fn orchestrator(&self, insecure: bool) -> anyhow::Result<Orchestrator> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
        let ws = &self.workspace;

        let prober = if insecure {
            NetProber::insecure(PROBE_TIMEOUT)?
        } else {
            NetProber::new(PROBE_TIMEOUT)?
        };

        let collaborators = Collaborators {
            infra: Arc::new(TerraformDriver::new(
                runner.clone(),
                ws.terraform_dir(),
                ws.plan_path(),
            )),
            tunnel: Arc::new(WireGuard::new(runner.clone(), ws.wireguard_dir()).with_sudo(self.sudo)),
            config: Arc::new(Ansible::new(runner, ws.ansible_dir())),
            prober: Arc::new(prober),
        };

        tracing::debug!(
            "Project {} with config {}",
            ws.project_dir().display(),
            ws.config_path().display()
        );

        let defaults = Defaults {
            ssh_private_key: default_ssh_key().map(|path| path.display().to_string()),
            ..Defaults::default()
        };

        Ok(Orchestrator::new(ws.clone(), defaults, collaborators))
    }
}
