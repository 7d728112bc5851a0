//! ansible CLI wrapper

use crate::driver::{ConfigDriver, HostRecap, PingReport, PlayRecap};
use crate::error::{AnsibleError, Result};
use crate::role::Role;
use crate::vars::VarBag;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use vmflow_cloud::Readiness;
use vmflow_core::{CommandOutput, CommandRunner, Invocation};

pub const DEFAULT_PLAYBOOK: &str = "site.yml";

/// Ansible driver: `ansible` for pings, `ansible-playbook` for apply
pub struct Ansible {
    runner: Arc<dyn CommandRunner>,
    /// Directory holding the playbook and its roles
    project_dir: PathBuf,
    playbook: String,
}

impl Ansible {
    pub fn new(runner: Arc<dyn CommandRunner>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
            playbook: DEFAULT_PLAYBOOK.to_string(),
        }
    }

    pub fn with_playbook(mut self, playbook: impl Into<String>) -> Self {
        self.playbook = playbook.into();
        self
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.project_dir.join(&self.playbook)
    }

    fn invocation(&self, program: &str) -> Invocation {
        Invocation::new(program)
            .current_dir(&self.project_dir)
            // a freshly provisioned host has an unknown key by definition
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .env("ANSIBLE_NOCOLOR", "1")
            .env("ANSIBLE_FORCE_COLOR", "0")
    }

    fn ensure_inventory(inventory: &Path) -> Result<()> {
        if !inventory.is_file() {
            return Err(AnsibleError::InventoryNotFound(
                inventory.display().to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigDriver for Ansible {
    fn name(&self) -> &str {
        "ansible"
    }

    async fn check(&self) -> Readiness {
        for tool in ["ansible", "ansible-playbook"] {
            if !self.runner.is_installed(tool).await {
                return Readiness::failed(AnsibleError::ToolNotFound(tool.to_string()).to_string());
            }
        }
        let playbook = self.playbook_path();
        if !playbook.is_file() {
            return Readiness::failed(format!("Playbook not found: {}", playbook.display()));
        }
        Readiness::ok(format!("ansible ({})", playbook.display()))
    }

    async fn ping(&self, inventory: &Path) -> Result<PingReport> {
        Self::ensure_inventory(inventory)?;

        let invocation = self.invocation("ansible").args([
            "all".to_string(),
            "-i".to_string(),
            inventory.display().to_string(),
            "-m".to_string(),
            "ping".to_string(),
            "-o".to_string(),
        ]);
        let output = self.runner.run(&invocation).await?;
        let report = parse_ping(&output.stdout);

        if !report.unreachable.is_empty() {
            return Err(AnsibleError::Unreachable {
                hosts: report.unreachable,
                message: output.message(),
            });
        }
        if !output.success() || report.reachable.is_empty() {
            return Err(failed("ansible ping", &output));
        }

        info!(hosts = report.reachable.len(), "All hosts reachable");
        Ok(report)
    }

    async fn apply(
        &self,
        inventory: &Path,
        vars: &VarBag,
        role: Option<Role>,
    ) -> Result<PlayRecap> {
        Self::ensure_inventory(inventory)?;

        // Secrets go through a private temp file, never through argv
        let mut vars_file = tempfile::Builder::new()
            .prefix("vmflow-vars-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(&mut vars_file, vars)?;
        vars_file.flush()?;

        let mut invocation = self.invocation("ansible-playbook").args([
            "-i".to_string(),
            inventory.display().to_string(),
            self.playbook.clone(),
            "--extra-vars".to_string(),
            format!("@{}", vars_file.path().display()),
        ]);
        if let Some(role) = role {
            invocation = invocation.args(["--limit", role.as_str(), "--tags", role.as_str()]);
        }

        let output = self.runner.run(&invocation).await?;
        let recap = parse_recap(&output.stdout);

        if !output.success() {
            let failure = parse_failure(&output.stdout);
            let host = failure
                .host
                .or_else(|| recap.failing_host().map(str::to_string));
            return Err(AnsibleError::PlaybookFailed {
                host,
                role: failure.role,
                message: failure.message.unwrap_or_else(|| output.message()),
            });
        }

        if recap.hosts.is_empty() {
            warn!("ansible-playbook finished without a PLAY RECAP");
        }
        info!(changed = recap.changed(), "Playbook finished");
        Ok(recap)
    }
}

fn failed(command: &str, output: &CommandOutput) -> AnsibleError {
    AnsibleError::CommandFailed {
        command: command.to_string(),
        stderr: output.message(),
    }
}

/// Parse one-line (`-o`) ping output:
/// `host | SUCCESS => {...}` / `host | UNREACHABLE! => {...}`
pub fn parse_ping(stdout: &str) -> PingReport {
    let mut report = PingReport::default();
    for line in stdout.lines() {
        let Some((host, rest)) = line.split_once(" | ") else {
            continue;
        };
        let host = host.trim().to_string();
        if rest.starts_with("SUCCESS") {
            report.reachable.push(host);
        } else if rest.starts_with("UNREACHABLE") || rest.starts_with("FAILED") {
            report.unreachable.push(host);
        }
    }
    report
}

/// Parse the `PLAY RECAP` block
pub fn parse_recap(stdout: &str) -> PlayRecap {
    let mut recap = PlayRecap::default();
    let Some(start) = stdout.find("PLAY RECAP") else {
        return recap;
    };

    for line in stdout[start..].lines().skip(1) {
        let Some((host, counters)) = line.split_once(" : ") else {
            continue;
        };
        let mut entry = HostRecap {
            host: host.trim().to_string(),
            ..Default::default()
        };
        for pair in counters.split_whitespace() {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.parse().unwrap_or(0);
            match key {
                "ok" => entry.ok = value,
                "changed" => entry.changed = value,
                "unreachable" => entry.unreachable = value,
                "failed" => entry.failed = value,
                _ => {}
            }
        }
        recap.hosts.push(entry);
    }
    recap
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Failure {
    pub host: Option<String>,
    pub role: Option<String>,
    pub message: Option<String>,
}

/// Locate the first failing task: the role comes from the enclosing
/// `TASK [role : name]` header, the host from `fatal: [host]`.
pub fn parse_failure(stdout: &str) -> Failure {
    let mut current_role = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix("TASK [") {
            let name = header.split(']').next().unwrap_or("");
            current_role = name
                .split_once(" : ")
                .map(|(role, _)| role.trim().to_string());
            continue;
        }

        let rest = line
            .strip_prefix("fatal: [")
            .or_else(|| line.strip_prefix("failed: ["));
        if let Some(rest) = rest {
            let host = rest.split(']').next().unwrap_or("").to_string();
            let message = rest.split_once("=>").map(|(_, m)| m.trim().to_string());
            return Failure {
                host: Some(host),
                role: current_role,
                message,
            };
        }
    }

    Failure::default()
}
