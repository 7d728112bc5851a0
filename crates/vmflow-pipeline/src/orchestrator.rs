//! Pipeline orchestrator
//!
//! Sequences the collaborators through the deployment stages. No stage
//! trusts memory of a previous run: each one probes the real state of the
//! world (infra state, inventory file, tunnel interface) before acting, so
//! an interrupted run can simply be started again.

use crate::addresses::AddressBook;
use crate::error::{PipelineError, Result};
use crate::record::{DeploymentRecord, RecordStore};
use crate::stage::{Outcome, RunReport, Stage, StageStatus};
use crate::verify::{HealthReport, HealthSummary, Prober, Verifier, default_endpoints};
use crate::workspace::Workspace;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vmflow_ansible::{AnsibleError, ConfigDriver, Inventory, Role, VarBag, vars};
use vmflow_cloud::{InfraDriver, InfraVars, InfrastructureOutputs};
use vmflow_core::{Defaults, RunConfiguration, resolve_from_path, secrets};
use vmflow_network::{TunnelConfig, TunnelDriver};

/// The external systems a pipeline drives
#[derive(Clone)]
pub struct Collaborators {
    pub infra: Arc<dyn InfraDriver>,
    pub tunnel: Arc<dyn TunnelDriver>,
    pub config: Arc<dyn ConfigDriver>,
    pub prober: Arc<dyn Prober>,
}

/// Progress callbacks, e.g. for spinners
pub trait Observer: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_completed(&self, _stage: Stage, _note: &str) {}
    fn stage_skipped(&self, _stage: Stage, _reason: &str) {}
    fn stage_failed(&self, _stage: Stage, _error: &PipelineError) {}
    fn health_report(&self, _report: &HealthReport) {}
}

/// Observer that ignores everything
pub struct SilentObserver;

impl Observer for SilentObserver {}

/// Operator confirmation for destructive actions
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmation that always declines
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Where a run enters the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Full,
    Infra,
    Network,
    /// Deploy services, optionally one role only. With `assume_ready` the
    /// caller asserts infra and tunnel are up and only the inventory is
    /// required.
    Services {
        role: Option<Role>,
        assume_ready: bool,
    },
    Verify,
    /// Like `Verify`, but every endpoint counts toward health
    Health,
    Connectivity,
    Destroy {
        auto_confirm: bool,
    },
}

impl Entry {
    pub fn name(&self) -> &'static str {
        match self {
            Entry::Full => "up",
            Entry::Infra => "infra",
            Entry::Network => "network",
            Entry::Services { .. } => "services",
            Entry::Verify => "verify",
            Entry::Health => "health",
            Entry::Connectivity => "connectivity",
            Entry::Destroy { .. } => "destroy",
        }
    }

    /// Stages run for this entry, in order. `Init` and `Done` are implicit.
    pub fn stages(&self) -> Vec<Stage> {
        use Stage::*;
        match self {
            Entry::Full => vec![
                PrereqChecked,
                SecretsResolved,
                InfraApplied,
                InventoryGenerated,
                TunnelUp,
                HostsReachable,
                ServicesDeployed,
                Verified,
            ],
            Entry::Infra => vec![PrereqChecked, SecretsResolved, InfraApplied, InventoryGenerated],
            Entry::Network => vec![PrereqChecked, SecretsResolved, InventoryGenerated, TunnelUp],
            Entry::Services {
                assume_ready: false,
                ..
            } => vec![
                PrereqChecked,
                SecretsResolved,
                InventoryGenerated,
                TunnelUp,
                HostsReachable,
                ServicesDeployed,
            ],
            Entry::Services {
                assume_ready: true,
                ..
            } => vec![PrereqChecked, SecretsResolved, HostsReachable, ServicesDeployed],
            Entry::Verify | Entry::Health => vec![PrereqChecked, SecretsResolved, Verified],
            Entry::Connectivity => vec![
                PrereqChecked,
                SecretsResolved,
                InventoryGenerated,
                HostsReachable,
            ],
            Entry::Destroy { .. } => vec![PrereqChecked, ConfirmIntent, InfraDestroyed, ArtifactsRemoved],
        }
    }

    fn needs_infra(&self) -> bool {
        !matches!(
            self,
            Entry::Services {
                assume_ready: true,
                ..
            }
        )
    }

    fn needs_tunnel(&self) -> bool {
        matches!(
            self,
            Entry::Full
                | Entry::Network
                | Entry::Services {
                    assume_ready: false,
                    ..
                }
        )
    }

    fn needs_config(&self) -> bool {
        matches!(
            self,
            Entry::Full | Entry::Services { .. } | Entry::Connectivity
        )
    }
}

/// Mutable state of a single run
struct RunContext {
    entry: Entry,
    cfg: Option<Arc<RunConfiguration>>,
    pending_secrets: Vec<(&'static str, String)>,
    outputs: Option<InfrastructureOutputs>,
    destroy_error: Option<PipelineError>,
}

impl RunContext {
    fn new(entry: Entry) -> Self {
        Self {
            entry,
            cfg: None,
            pending_secrets: Vec::new(),
            outputs: None,
            destroy_error: None,
        }
    }

    fn config(&self) -> Result<Arc<RunConfiguration>> {
        self.cfg
            .clone()
            .ok_or_else(|| PipelineError::Internal("configuration not resolved".to_string()))
    }
}

pub struct Orchestrator {
    workspace: Workspace,
    defaults: Defaults,
    collab: Collaborators,
    observer: Arc<dyn Observer>,
    confirm: Arc<dyn Confirm>,
    overrides: VarBag,
    cancel: watch::Receiver<bool>,
}

impl Orchestrator {
    pub fn new(workspace: Workspace, defaults: Defaults, collab: Collaborators) -> Self {
        Self {
            workspace,
            defaults,
            collab,
            observer: Arc::new(SilentObserver),
            confirm: Arc::new(Decline),
            overrides: VarBag::new(),
            cancel: watch::channel(false).1,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Extra variables that win over everything derived from the config
    pub fn with_overrides(mut self, overrides: VarBag) -> Self {
        self.overrides = overrides;
        self
    }

    /// Stop before the next stage once `true` is sent. The running stage is
    /// never aborted, so a tool handling its own interrupt can finish cleanly.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run the stages of `entry` until `Done` or the first failure.
    pub async fn run(&self, entry: Entry) -> RunReport {
        let mut report = RunReport::new();
        let mut ctx = RunContext::new(entry);
        info!(entry = entry.name(), "Starting pipeline");

        for stage in entry.stages() {
            if self.cancelled() {
                info!(stage = %stage, "Interrupted before stage");
                report.outcome = Outcome::Cancelled;
                return report;
            }
            report.visited.push(stage);
            self.observer.stage_started(stage);

            match self.execute(stage, &mut ctx, &mut report).await {
                Ok(StageStatus::Completed(note)) => {
                    info!(stage = %stage, "{}", note);
                    self.observer.stage_completed(stage, &note);
                }
                Ok(StageStatus::Skipped(reason)) => {
                    info!(stage = %stage, "Skipped: {}", reason);
                    report.skipped.push(stage);
                    self.observer.stage_skipped(stage, &reason);
                }
                Err(PipelineError::Cancelled) => {
                    info!(stage = %stage, "Cancelled by operator");
                    self.observer.stage_failed(stage, &PipelineError::Cancelled);
                    report.outcome = Outcome::Cancelled;
                    return report;
                }
                // the tool most likely failed because it received the interrupt
                Err(error) if self.cancelled() => {
                    warn!(stage = %stage, "Interrupted: {}", error);
                    self.observer.stage_failed(stage, &error);
                    report.outcome = Outcome::Cancelled;
                    return report;
                }
                Err(error) => {
                    warn!(stage = %stage, "{}", error);
                    self.observer.stage_failed(stage, &error);
                    report.outcome = Outcome::Failed { stage, error };
                    return report;
                }
            }
        }

        // destroy keeps going after a partial failure, then reports it
        if let Some(error) = ctx.destroy_error.take() {
            report.outcome = Outcome::Failed {
                stage: Stage::InfraDestroyed,
                error,
            };
            return report;
        }

        report.visited.push(Stage::Done);
        report
    }

    async fn execute(
        &self,
        stage: Stage,
        ctx: &mut RunContext,
        report: &mut RunReport,
    ) -> Result<StageStatus> {
        match stage {
            Stage::PrereqChecked => self.check_prerequisites(ctx).await,
            Stage::SecretsResolved => self.persist_secrets(ctx),
            Stage::InfraApplied => self.apply_infra(ctx).await,
            Stage::InventoryGenerated => self.generate_inventory(ctx).await,
            Stage::TunnelUp => self.bring_up_tunnel(ctx).await,
            Stage::HostsReachable => self.check_hosts().await,
            Stage::ServicesDeployed => self.deploy_services(ctx, report).await,
            Stage::Verified => self.verify(ctx, report).await,
            Stage::ConfirmIntent => self.confirm_intent(ctx).await,
            Stage::InfraDestroyed => self.destroy_infra(ctx).await,
            Stage::ArtifactsRemoved => self.remove_artifacts(ctx).await,
            Stage::Init | Stage::Done => Ok(StageStatus::skipped("implicit")),
        }
    }

    async fn check_prerequisites(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        let resolved = resolve_from_path(&self.defaults, self.workspace.config_path())?;
        match ctx.entry {
            Entry::Destroy { .. } => resolved.config.validate_resources()?,
            _ => resolved.config.validate()?,
        }

        ctx.pending_secrets = resolved
            .pending_secrets()
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let cfg = Arc::new(resolved.config);
        ctx.cfg = Some(cfg.clone());

        let entry = ctx.entry;
        let mut ready = Vec::new();
        let mut missing = Vec::new();
        let mut tally = |name: &str, readiness: vmflow_cloud::Readiness| {
            if readiness.ready {
                ready.push(name.to_string());
            } else {
                missing.push(
                    readiness
                        .error
                        .unwrap_or_else(|| format!("{} is not ready", name)),
                );
            }
        };

        if entry.needs_infra() {
            tally(self.collab.infra.name(), self.collab.infra.check().await);
        }
        if entry.needs_tunnel() && cfg.network_mode.includes_wireguard() {
            tally(self.collab.tunnel.interface(), self.collab.tunnel.check().await);
        }
        if entry.needs_config() {
            tally(self.collab.config.name(), self.collab.config.check().await);
        }

        if !missing.is_empty() {
            return Err(PipelineError::PrerequisiteMissing(missing.join("; ")));
        }

        if let Entry::Services {
            assume_ready: true, ..
        } = entry
        {
            let inventory = self.workspace.inventory_path();
            if !inventory.is_file() {
                return Err(PipelineError::PrerequisiteMissing(format!(
                    "{} not found; run `vmflow infra` first or drop --assume-ready",
                    inventory.display()
                )));
            }
        }

        if ready.is_empty() {
            Ok(StageStatus::completed("configuration valid"))
        } else {
            Ok(StageStatus::completed(format!("{} ready", ready.join(", "))))
        }
    }

    /// Write generated secrets back before anything can fail
    fn persist_secrets(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        if ctx.pending_secrets.is_empty() {
            return Ok(StageStatus::skipped("all secrets already persisted"));
        }

        let pairs: Vec<(&str, &str)> = ctx
            .pending_secrets
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        secrets::persist(self.workspace.config_path(), &pairs)
            .map_err(|e| PipelineError::Secret(e.to_string()))?;

        let names: Vec<&str> = ctx.pending_secrets.iter().map(|(key, _)| *key).collect();
        let note = format!(
            "generated {} into {}",
            names.join(", "),
            self.workspace.config_path().display()
        );
        ctx.pending_secrets.clear();
        Ok(StageStatus::completed(note))
    }

    async fn apply_infra(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        let infra = &self.collab.infra;

        let existed = infra.state_exists().await?;
        let plan = infra.plan(&InfraVars::from_config(&cfg)).await?;

        if existed && !plan.has_changes {
            infra.discard(&plan);
            ctx.outputs = Some(infra.outputs().await?);
            return Ok(StageStatus::skipped("no changes, reusing existing outputs"));
        }

        let outputs = infra.apply(&plan).await?;
        ctx.outputs = Some(outputs);
        Ok(StageStatus::completed(format!("applied ({})", plan.summary)))
    }

    /// Fresh outputs of the current infra state, fetched at most once per run
    async fn current_outputs(&self, ctx: &mut RunContext) -> Result<InfrastructureOutputs> {
        if let Some(outputs) = &ctx.outputs {
            return Ok(outputs.clone());
        }
        if !self.collab.infra.state_exists().await? {
            return Err(PipelineError::PrerequisiteMissing(
                "no infrastructure state found; run `vmflow infra` first".to_string(),
            ));
        }
        let outputs = self.collab.infra.outputs().await?;
        ctx.outputs = Some(outputs.clone());
        Ok(outputs)
    }

    async fn generate_inventory(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        let outputs = self.current_outputs(ctx).await?;
        let inventory = Inventory::generate(&outputs, &cfg)?;

        let path = self.workspace.inventory_path();
        let existed = path.exists();
        if !inventory.write_if_changed(&path)? {
            return Ok(StageStatus::skipped("inventory up to date"));
        }

        let action = if existed { "updated" } else { "created" };
        Ok(StageStatus::completed(format!(
            "{} {} (host {})",
            action,
            path.display(),
            inventory.connection_address()
        )))
    }

    async fn bring_up_tunnel(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        let tunnel = &self.collab.tunnel;

        if !cfg.network_mode.includes_wireguard() {
            return Ok(StageStatus::skipped(format!(
                "network mode {} does not use WireGuard",
                cfg.network_mode
            )));
        }
        // a partial run only repairs the tunnel, a full run always recycles it
        if matches!(ctx.entry, Entry::Services { .. }) && tunnel.is_up().await? {
            return Ok(StageStatus::skipped(format!("{} already up", tunnel.interface())));
        }

        let outputs = self.current_outputs(ctx).await?;
        let config = TunnelConfig::from_outputs(&outputs)?;
        tunnel.bring_up(&config).await?;

        if !tunnel.is_up().await? {
            return Err(PipelineError::Tunnel(format!(
                "{} is not up after bring-up",
                tunnel.interface()
            )));
        }
        Ok(StageStatus::completed(format!(
            "{} up, peer {}",
            tunnel.interface(),
            config.endpoint
        )))
    }

    async fn check_hosts(&self) -> Result<StageStatus> {
        let path = self.workspace.inventory_path();
        let report = self.collab.config.ping(&path).await.map_err(|e| match e {
            AnsibleError::CommandFailed { .. } => PipelineError::Connectivity {
                hosts: Vec::new(),
                message: e.to_string(),
            },
            other => other.into(),
        })?;

        Ok(StageStatus::completed(format!(
            "{} host(s) reachable",
            report.reachable.len()
        )))
    }

    async fn deploy_services(
        &self,
        ctx: &mut RunContext,
        report: &mut RunReport,
    ) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        let role = match ctx.entry {
            Entry::Services { role, .. } => role,
            _ => None,
        };

        let path = self.workspace.inventory_path();
        let vars = vars::merge(&cfg, &self.overrides);
        let recap = self
            .collab
            .config
            .apply(&path, &vars, role)
            .await
            .map_err(|e| match e {
                AnsibleError::CommandFailed { .. } => PipelineError::ConfigurationApply {
                    host: None,
                    role: role.map(|r| r.to_string()),
                    message: e.to_string(),
                },
                other => other.into(),
            })?;

        let roles = role.map(|r| vec![r]).unwrap_or_else(|| Role::enabled(&cfg));
        self.write_record(ctx, &cfg, roles.clone()).await;

        let note = format!(
            "{} applied, {} change(s)",
            roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            recap.changed()
        );
        report.recap = Some(recap);
        Ok(StageStatus::completed(note))
    }

    /// The record is informational; failing to write it never fails a run.
    async fn write_record(&self, ctx: &mut RunContext, cfg: &RunConfiguration, roles: Vec<Role>) {
        let outputs = match &ctx.outputs {
            Some(outputs) => outputs.clone(),
            None => match self.collab.infra.outputs().await {
                Ok(outputs) => outputs,
                Err(e) => {
                    debug!("Outputs unavailable for deployment record: {}", e);
                    InfrastructureOutputs::new()
                }
            },
        };

        let record = DeploymentRecord::new(cfg, AddressBook::new(&outputs, cfg), roles);
        let store = RecordStore::new(self.workspace.record_path());
        if let Err(e) = store.save(&record) {
            warn!("Failed to write deployment record: {}", e);
        }
    }

    async fn verify(&self, ctx: &mut RunContext, report: &mut RunReport) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        let outputs = self.current_outputs(ctx).await?;

        let mut endpoints = default_endpoints(&cfg, &outputs)?;
        if ctx.entry == Entry::Health {
            for endpoint in &mut endpoints {
                endpoint.required = true;
            }
        }

        let verifier = Verifier::new(self.collab.prober.clone());
        let mut stream = std::pin::pin!(verifier.check(&endpoints));
        let mut summary = HealthSummary::default();
        while let Some(health) = stream.next().await {
            self.observer.health_report(&health);
            summary.reports.push(health);
        }

        let unhealthy = summary.unhealthy_required();
        report.health = Some(summary);

        if unhealthy.is_empty() {
            Ok(StageStatus::completed("all required endpoints healthy"))
        } else {
            Ok(StageStatus::completed(format!(
                "unhealthy: {}",
                unhealthy.join(", ")
            )))
        }
    }

    async fn confirm_intent(&self, ctx: &RunContext) -> Result<StageStatus> {
        if let Entry::Destroy { auto_confirm: true } = ctx.entry {
            return Ok(StageStatus::completed("auto-confirmed"));
        }

        let prompt = format!(
            "Destroy all infrastructure managed by {}?",
            self.workspace.terraform_dir().display()
        );
        // blocks on stdin
        let confirm = self.confirm.clone();
        let answer = tokio::task::spawn_blocking(move || confirm.confirm(&prompt));
        let mut cancel = self.cancel.clone();

        tokio::select! {
            answer = answer => match answer {
                Ok(true) => Ok(StageStatus::completed("confirmed")),
                Ok(false) => Err(PipelineError::Cancelled),
                Err(e) => Err(PipelineError::Internal(format!("confirmation prompt failed: {}", e))),
            },
            Ok(_) = cancel.wait_for(|cancelled| *cancelled) => Err(PipelineError::Cancelled),
        }
    }

    async fn destroy_infra(&self, ctx: &mut RunContext) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        match self.collab.infra.destroy(&InfraVars::from_config(&cfg)).await {
            Ok(destroyed) => Ok(StageStatus::completed(format!(
                "{} resource(s) removed",
                destroyed.removed.len()
            ))),
            Err(e) => match PipelineError::from(e) {
                error @ PipelineError::Destroy { .. } => {
                    warn!("{}; removing local artifacts anyway", error);
                    let note = error.to_string();
                    ctx.destroy_error = Some(error);
                    Ok(StageStatus::completed(note))
                }
                other => Err(other),
            },
        }
    }

    async fn remove_artifacts(&self, ctx: &RunContext) -> Result<StageStatus> {
        let cfg = ctx.config()?;
        if cfg.network_mode.includes_wireguard() {
            if let Err(e) = self.collab.tunnel.teardown().await {
                warn!("Failed to tear down tunnel: {}", e);
            }
        }

        let mut removed = 0;
        for path in self.workspace.artifacts() {
            if vmflow_core::fs::remove_if_exists(&path)? {
                debug!("Removed {}", path.display());
                removed += 1;
            }
        }
        Ok(StageStatus::completed(format!("{} artifact(s) removed", removed)))
    }

    /// Addresses of the current deployment, read from live infra outputs
    pub async fn addresses(&self) -> Result<AddressBook> {
        let resolved = resolve_from_path(&self.defaults, self.workspace.config_path())?;
        let mut ctx = RunContext::new(Entry::Verify);
        let outputs = self.current_outputs(&mut ctx).await?;
        Ok(AddressBook::new(&outputs, &resolved.config))
    }

    pub async fn last_deployment(&self) -> Result<Option<DeploymentRecord>> {
        RecordStore::new(self.workspace.record_path()).load().await
    }
}
