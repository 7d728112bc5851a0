use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vmflow_ansible::{AnsibleError, ConfigDriver, HostRecap, PingReport, PlayRecap, Role, VarBag};
use vmflow_cloud::outputs::keys;
use vmflow_cloud::{
    CloudError, DestroyReport, InfraDriver, InfraVars, InfrastructureOutputs, PlanHandle,
    PlanSummary, Readiness,
};
use vmflow_core::Defaults;
use vmflow_network::{TunnelConfig, TunnelDriver, TunnelError};
use vmflow_pipeline::{Collaborators, Orchestrator, Probe, Prober, Workspace};

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.root.path().join("vmflow.env"), content).unwrap();
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(self.root.path().join("vmflow.env")).unwrap()
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.path())
    }
}

/// Outputs of a typical `both` network deployment
pub fn sample_outputs() -> InfrastructureOutputs {
    InfrastructureOutputs::new()
        .with(keys::PUBLIC_IP, "203.0.113.10")
        .with(keys::WIREGUARD_IP, "10.8.0.1")
        .with(keys::TAILSCALE_IP, "100.64.0.5")
        .with(keys::WIREGUARD_PORT, "51820")
        .with(keys::WIREGUARD_SERVER_PUBLIC_KEY, "c2VydmVyLXB1YmxpYy1rZXk=")
        .with(keys::WIREGUARD_CLIENT_PRIVATE_KEY, "Y2xpZW50LXByaXZhdGUta2V5")
        .with(keys::WIREGUARD_CLIENT_IP, "10.8.0.2")
}

#[derive(Default)]
struct InfraState {
    exists: bool,
    has_changes: bool,
    remaining: Vec<String>,
    calls: Vec<&'static str>,
}

/// In-memory provisioning backend
pub struct FakeInfra {
    outputs: InfrastructureOutputs,
    state: Mutex<InfraState>,
}

#[allow(dead_code)]
impl FakeInfra {
    pub fn fresh() -> Self {
        Self {
            outputs: sample_outputs(),
            state: Mutex::new(InfraState {
                has_changes: true,
                ..Default::default()
            }),
        }
    }

    /// State already applied and matching the configuration
    pub fn converged() -> Self {
        Self {
            outputs: sample_outputs(),
            state: Mutex::new(InfraState {
                exists: true,
                ..Default::default()
            }),
        }
    }

    /// Destroy leaves the given resources behind
    pub fn stuck(self, remaining: &[&str]) -> Self {
        self.state.lock().unwrap().remaining = remaining.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls().contains(&name)
    }
}

#[async_trait]
impl InfraDriver for FakeInfra {
    fn name(&self) -> &str {
        "fake-infra"
    }

    async fn check(&self) -> Readiness {
        Readiness::ok("fake")
    }

    async fn state_exists(&self) -> vmflow_cloud::Result<bool> {
        Ok(self.state.lock().unwrap().exists)
    }

    async fn plan(&self, _vars: &InfraVars) -> vmflow_cloud::Result<PlanHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("plan");
        let summary = if state.has_changes {
            PlanSummary {
                add: 3,
                ..Default::default()
            }
        } else {
            PlanSummary::default()
        };
        Ok(PlanHandle::new("plan.tfplan", summary, state.has_changes))
    }

    async fn apply(&self, _plan: &PlanHandle) -> vmflow_cloud::Result<InfrastructureOutputs> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("apply");
        state.exists = true;
        state.has_changes = false;
        Ok(self.outputs.clone())
    }

    async fn output(&self, key: &str) -> vmflow_cloud::Result<Option<String>> {
        Ok(self.outputs.get(key).map(str::to_string))
    }

    async fn outputs(&self) -> vmflow_cloud::Result<InfrastructureOutputs> {
        self.state.lock().unwrap().calls.push("outputs");
        Ok(self.outputs.clone())
    }

    async fn destroy(&self, _vars: &InfraVars) -> vmflow_cloud::Result<DestroyReport> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("destroy");
        if !state.remaining.is_empty() {
            return Err(CloudError::Destroy {
                remaining: state.remaining.clone(),
                message: "resource still in use".to_string(),
            });
        }
        state.exists = false;
        let mut report = DestroyReport::new();
        report.add_removed("sakura_server.vm");
        Ok(report)
    }
}

/// Tunnel that comes up on request
#[derive(Default)]
pub struct FakeTunnel {
    up: Mutex<bool>,
    bring_ups: Mutex<u32>,
    teardowns: Mutex<u32>,
}

#[allow(dead_code)]
impl FakeTunnel {
    pub fn already_up() -> Self {
        Self {
            up: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn bring_ups(&self) -> u32 {
        *self.bring_ups.lock().unwrap()
    }

    pub fn teardowns(&self) -> u32 {
        *self.teardowns.lock().unwrap()
    }
}

#[async_trait]
impl TunnelDriver for FakeTunnel {
    fn interface(&self) -> &str {
        "wg0"
    }

    async fn check(&self) -> Readiness {
        Readiness::ok("fake")
    }

    async fn bring_up(&self, _config: &TunnelConfig) -> vmflow_network::Result<()> {
        *self.bring_ups.lock().unwrap() += 1;
        *self.up.lock().unwrap() = true;
        Ok(())
    }

    async fn teardown(&self) -> vmflow_network::Result<()> {
        *self.teardowns.lock().unwrap() += 1;
        *self.up.lock().unwrap() = false;
        Ok(())
    }

    async fn is_up(&self) -> Result<bool, TunnelError> {
        Ok(*self.up.lock().unwrap())
    }
}

/// A configuration run recorded by [`FakeConfig`]
#[derive(Debug, Clone)]
pub struct AppliedRun {
    pub inventory: PathBuf,
    pub vars: VarBag,
    pub role: Option<Role>,
}

#[derive(Default)]
pub struct FakeConfig {
    unreachable: Vec<String>,
    pings: Mutex<u32>,
    runs: Mutex<Vec<AppliedRun>>,
}

#[allow(dead_code)]
impl FakeConfig {
    pub fn unreachable(hosts: &[&str]) -> Self {
        Self {
            unreachable: hosts.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn pings(&self) -> u32 {
        *self.pings.lock().unwrap()
    }

    pub fn runs(&self) -> Vec<AppliedRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigDriver for FakeConfig {
    fn name(&self) -> &str {
        "fake-config"
    }

    async fn check(&self) -> Readiness {
        Readiness::ok("fake")
    }

    async fn ping(&self, inventory: &Path) -> vmflow_ansible::Result<PingReport> {
        *self.pings.lock().unwrap() += 1;
        if !inventory.is_file() {
            return Err(AnsibleError::InventoryNotFound(inventory.display().to_string()));
        }
        if !self.unreachable.is_empty() {
            return Err(AnsibleError::Unreachable {
                hosts: self.unreachable.clone(),
                message: "UNREACHABLE! ssh: connect to host timed out".to_string(),
            });
        }
        Ok(PingReport {
            reachable: vec!["vmflow".to_string()],
            unreachable: Vec::new(),
        })
    }

    async fn apply(
        &self,
        inventory: &Path,
        vars: &VarBag,
        role: Option<Role>,
    ) -> vmflow_ansible::Result<PlayRecap> {
        self.runs.lock().unwrap().push(AppliedRun {
            inventory: inventory.to_path_buf(),
            vars: vars.clone(),
            role,
        });
        Ok(PlayRecap {
            hosts: vec![HostRecap {
                host: "vmflow".to_string(),
                ok: 12,
                changed: 4,
                ..Default::default()
            }],
        })
    }
}

/// Prober with a fixed set of failing endpoints, matched by target
#[derive(Default)]
pub struct FakeProber {
    failing: BTreeSet<String>,
    probed: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeProber {
    pub fn failing(targets: &[&str]) -> Self {
        Self {
            failing: targets.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, probe: &Probe) -> Result<String, String> {
        let target = probe.target().to_string();
        self.probed.lock().unwrap().push(target.clone());
        if self.failing.iter().any(|f| target.contains(f.as_str())) {
            Err("connection refused".to_string())
        } else {
            Ok("ok".to_string())
        }
    }
}

/// Fakes plus an orchestrator wired to them
pub struct Harness {
    pub infra: Arc<FakeInfra>,
    pub tunnel: Arc<FakeTunnel>,
    pub config: Arc<FakeConfig>,
    pub prober: Arc<FakeProber>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self {
            infra: Arc::new(FakeInfra::fresh()),
            tunnel: Arc::new(FakeTunnel::default()),
            config: Arc::new(FakeConfig::default()),
            prober: Arc::new(FakeProber::default()),
        }
    }

    pub fn with_infra(mut self, infra: FakeInfra) -> Self {
        self.infra = Arc::new(infra);
        self
    }

    pub fn with_tunnel(mut self, tunnel: FakeTunnel) -> Self {
        self.tunnel = Arc::new(tunnel);
        self
    }

    pub fn with_config(mut self, config: FakeConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_prober(mut self, prober: FakeProber) -> Self {
        self.prober = Arc::new(prober);
        self
    }

    pub fn orchestrator(&self, project: &TestProject) -> Orchestrator {
        let collaborators = Collaborators {
            infra: self.infra.clone(),
            tunnel: self.tunnel.clone(),
            config: self.config.clone(),
            prober: self.prober.clone(),
        };
        let defaults = Defaults {
            ssh_private_key: Some("/home/operator/.ssh/id_ed25519".to_string()),
            ..Defaults::default()
        };
        Orchestrator::new(project.workspace(), defaults, collaborators)
    }
}
