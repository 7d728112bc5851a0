//! TerraformDriver: InfraDriver implementation backed by the terraform CLI

use crate::error::TerraformError;
use crate::terraform::Terraform;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use vmflow_cloud::{
    CloudError, DestroyReport, InfraDriver, InfraVars, InfrastructureOutputs, PlanHandle,
    PlanSummary, Readiness, Result,
};
use vmflow_core::{CommandRunner, fs};

/// Terraform driver
pub struct TerraformDriver {
    terraform: Terraform,
    plan_path: PathBuf,
}

impl TerraformDriver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        working_dir: impl Into<PathBuf>,
        plan_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            terraform: Terraform::new(runner, working_dir),
            plan_path: plan_path.into(),
        }
    }

    pub fn plan_path(&self) -> &Path {
        &self.plan_path
    }

    async fn ensure_initialized(&self) -> std::result::Result<(), TerraformError> {
        if !self.terraform.has_configuration() {
            return Err(TerraformError::NoConfiguration(
                self.terraform.working_dir().to_path_buf(),
            ));
        }
        if !self.terraform.is_initialized() {
            info!("Initializing terraform in {}", self.terraform.working_dir().display());
            self.terraform.init().await?;
        }
        Ok(())
    }

    fn vars_list(vars: &InfraVars) -> Vec<(String, String)> {
        vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl From<TerraformError> for CloudError {
    fn from(err: TerraformError) -> Self {
        match err {
            TerraformError::TerraformNotFound | TerraformError::NoConfiguration(_) => {
                CloudError::NotReady(err.to_string())
            }
            TerraformError::CommandFailed { .. } => CloudError::CommandFailed(err.to_string()),
            TerraformError::JsonError(e) => CloudError::Json(e),
            TerraformError::IoError(e) => CloudError::Io(e),
            TerraformError::Core(e) => CloudError::Core(e),
        }
    }
}

#[async_trait]
impl InfraDriver for TerraformDriver {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn check(&self) -> Readiness {
        if !self.terraform.is_installed().await {
            return Readiness::failed(TerraformError::TerraformNotFound.to_string());
        }
        if !self.terraform.has_configuration() {
            return Readiness::failed(
                TerraformError::NoConfiguration(self.terraform.working_dir().to_path_buf())
                    .to_string(),
            );
        }

        match self.terraform.version().await {
            Ok(version) => Readiness::ok(format!("terraform v{}", version)),
            Err(e) => Readiness::failed(e.to_string()),
        }
    }

    async fn state_exists(&self) -> Result<bool> {
        self.ensure_initialized().await?;
        Ok(!self.terraform.state_list().await?.is_empty())
    }

    async fn plan(&self, vars: &InfraVars) -> Result<PlanHandle> {
        self.ensure_initialized().await?;

        // Never let a stale plan from an earlier run be applied
        fs::remove_if_exists(&self.plan_path)?;
        if let Some(parent) = self.plan_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let outcome = self
            .terraform
            .plan(&Self::vars_list(vars), &self.plan_path)
            .await
            .map_err(|e| CloudError::Plan(e.to_string()))?;

        let summary = PlanSummary::parse(&outcome.text);
        info!(
            "Plan: {} ({})",
            summary,
            if outcome.has_changes { "changes pending" } else { "no changes" }
        );

        Ok(PlanHandle::new(&self.plan_path, summary, outcome.has_changes))
    }

    async fn apply(&self, plan: &PlanHandle) -> Result<InfrastructureOutputs> {
        let result = self.terraform.apply(&plan.path).await;

        // The plan is single-use whatever happened
        if let Err(e) = fs::remove_if_exists(&plan.path) {
            warn!("Failed to remove plan file {}: {}", plan.path.display(), e);
        }

        result.map_err(|e| CloudError::Apply(e.to_string()))?;
        self.outputs().await
    }

    async fn output(&self, key: &str) -> Result<Option<String>> {
        let outputs = self.terraform.output_json().await?;
        Ok(outputs.get(key).and_then(|v| v.as_text()))
    }

    async fn outputs(&self) -> Result<InfrastructureOutputs> {
        let outputs = self.terraform.output_json().await?;
        Ok(outputs
            .into_iter()
            .filter_map(|(key, value)| value.as_text().map(|text| (key, text)))
            .collect())
    }

    async fn destroy(&self, vars: &InfraVars) -> Result<DestroyReport> {
        let start = Instant::now();
        let mut report = DestroyReport::new();
        // terraform still evaluates variables on destroy
        let vars = Self::vars_list(vars);

        self.ensure_initialized().await?;
        let before = self.terraform.state_list().await?;
        if before.is_empty() {
            info!("Nothing to destroy");
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }

        match self.terraform.destroy(&vars).await {
            Ok(()) => {
                for resource in before {
                    report.add_removed(resource);
                }
            }
            Err(e) => {
                warn!("terraform destroy failed, retrying per resource: {}", e);

                let remaining = self.terraform.state_list().await?;
                for resource in before.iter().filter(|r| !remaining.contains(r)) {
                    report.add_removed(resource.clone());
                }
                for resource in remaining {
                    match self.terraform.destroy_target(&resource, &vars).await {
                        Ok(()) => report.add_removed(resource),
                        Err(e) => report.add_failure(resource, e.to_string()),
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        if !report.is_success() {
            let message = report
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.resource, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CloudError::Destroy {
                remaining: report.remaining(),
                message,
            });
        }

        Ok(report)
    }
}
