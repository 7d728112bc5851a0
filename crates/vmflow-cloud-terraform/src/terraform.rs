//! terraform CLI wrapper
//!
//! Wraps the terraform CLI commands used by the driver.

use crate::error::{Result, TerraformError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vmflow_core::{CommandOutput, CommandRunner, Invocation};

/// Exit code of `plan -detailed-exitcode` when changes are present
const PLAN_EXIT_CHANGES: i32 = 2;

/// terraform CLI wrapper
pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
}

impl Terraform {
    pub fn new(runner: Arc<dyn CommandRunner>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub async fn is_installed(&self) -> bool {
        self.runner.is_installed("terraform").await
    }

    /// Whether the working directory holds any `*.tf` file
    pub fn has_configuration(&self) -> bool {
        std::fs::read_dir(&self.working_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .any(|e| e.path().extension().is_some_and(|ext| ext == "tf"))
            })
            .unwrap_or(false)
    }

    pub fn is_initialized(&self) -> bool {
        self.working_dir.join(".terraform").is_dir()
    }

    /// Run a terraform command and return its raw output
    async fn run_command(&self, args: &[String]) -> Result<CommandOutput> {
        let invocation = Invocation::new("terraform")
            .args(args.iter().cloned())
            .current_dir(&self.working_dir)
            .env("TF_IN_AUTOMATION", "1");

        Ok(self.runner.run(&invocation).await?)
    }

    /// Run a terraform command and return stdout, failing on non-zero exit
    async fn run_checked(&self, args: &[String]) -> Result<String> {
        let output = self.run_command(args).await?;
        if !output.success() {
            return Err(TerraformError::failed(&args[0], output.message()));
        }
        Ok(output.stdout)
    }

    /// `terraform version`
    pub async fn version(&self) -> Result<String> {
        let output = self.run_checked(&args(&["version", "-json"])).await?;
        let version: VersionInfo = serde_json::from_str(&output)?;
        Ok(version.terraform_version)
    }

    /// `terraform init`
    pub async fn init(&self) -> Result<()> {
        self.run_checked(&args(&["init", "-input=false", "-no-color"]))
            .await?;
        Ok(())
    }

    /// Resource addresses currently tracked in state
    pub async fn state_list(&self) -> Result<Vec<String>> {
        let output = self.run_command(&args(&["state", "list"])).await?;

        if !output.success() {
            // A missing state file is "no resources", not a failure
            if output.message().contains("No state file") {
                return Ok(Vec::new());
            }
            return Err(TerraformError::failed("state", output.message()));
        }

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// `terraform plan -out=<plan>`; returns whether changes are pending
    /// together with the human-readable plan text.
    pub async fn plan(&self, vars: &[(String, String)], out: &Path) -> Result<PlanOutcome> {
        let mut cmd = args(&["plan", "-input=false", "-no-color", "-detailed-exitcode"]);
        cmd.push(format!("-out={}", out.display()));
        cmd.extend(var_args(vars));

        let output = self.run_command(&cmd).await?;
        match output.status {
            Some(0) => Ok(PlanOutcome {
                has_changes: false,
                text: output.stdout,
            }),
            Some(PLAN_EXIT_CHANGES) => Ok(PlanOutcome {
                has_changes: true,
                text: output.stdout,
            }),
            _ => Err(TerraformError::failed("plan", output.message())),
        }
    }

    /// Apply a saved plan
    pub async fn apply(&self, plan: &Path) -> Result<()> {
        let mut cmd = args(&["apply", "-input=false", "-no-color", "-auto-approve"]);
        cmd.push(plan.display().to_string());
        self.run_checked(&cmd).await?;
        Ok(())
    }

    /// All root module outputs
    pub async fn output_json(&self) -> Result<BTreeMap<String, OutputValue>> {
        let output = self
            .run_checked(&args(&["output", "-json", "-no-color"]))
            .await?;

        if output.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let outputs: BTreeMap<String, OutputValue> = serde_json::from_str(&output)?;
        Ok(outputs)
    }

    /// Destroy everything in state
    pub async fn destroy(&self, vars: &[(String, String)]) -> Result<()> {
        let mut cmd = args(&["destroy", "-input=false", "-no-color", "-auto-approve"]);
        cmd.extend(var_args(vars));
        self.run_checked(&cmd).await?;
        Ok(())
    }

    /// Destroy a single resource address
    pub async fn destroy_target(&self, address: &str, vars: &[(String, String)]) -> Result<()> {
        let mut cmd = args(&["destroy", "-input=false", "-no-color", "-auto-approve"]);
        cmd.push(format!("-target={}", address));
        cmd.extend(var_args(vars));
        self.run_checked(&cmd).await?;
        Ok(())
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn var_args(vars: &[(String, String)]) -> impl Iterator<Item = String> + '_ {
    vars.iter()
        .flat_map(|(k, v)| ["-var".to_string(), format!("{}={}", k, v)])
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub has_changes: bool,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionInfo {
    terraform_version: String,
}

/// One entry of `terraform output -json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputValue {
    #[serde(default)]
    pub sensitive: bool,

    pub value: serde_json::Value,
}

impl OutputValue {
    /// Strings as-is, `null` as absent, anything else as compact JSON
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
