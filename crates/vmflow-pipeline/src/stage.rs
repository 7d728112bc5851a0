//! Pipeline stages and terminal states

use crate::error::{PipelineError, exit_code};
use crate::verify::HealthSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use vmflow_ansible::PlayRecap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    PrereqChecked,
    SecretsResolved,
    InfraApplied,
    InventoryGenerated,
    TunnelUp,
    HostsReachable,
    ServicesDeployed,
    Verified,
    ConfirmIntent,
    InfraDestroyed,
    ArtifactsRemoved,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::PrereqChecked => "prerequisites",
            Stage::SecretsResolved => "secrets",
            Stage::InfraApplied => "infrastructure",
            Stage::InventoryGenerated => "inventory",
            Stage::TunnelUp => "tunnel",
            Stage::HostsReachable => "connectivity",
            Stage::ServicesDeployed => "services",
            Stage::Verified => "verification",
            Stage::ConfirmIntent => "confirmation",
            Stage::InfraDestroyed => "destroy",
            Stage::ArtifactsRemoved => "cleanup",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage did after probing its precondition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed(String),
    Skipped(String),
}

impl StageStatus {
    pub fn completed(note: impl Into<String>) -> Self {
        Self::Completed(note.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// Terminal state of a run
#[derive(Debug)]
pub enum Outcome {
    Done,
    Failed { stage: Stage, error: PipelineError },
    Cancelled,
}

/// What happened during one invocation
#[derive(Debug)]
pub struct RunReport {
    /// Stages entered, in order, starting with `Init`
    pub visited: Vec<Stage>,
    /// Stages whose precondition probe decided nothing needed doing
    pub skipped: Vec<Stage>,
    pub outcome: Outcome,
    pub health: Option<HealthSummary>,
    pub recap: Option<PlayRecap>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            visited: vec![Stage::Init],
            skipped: Vec::new(),
            outcome: Outcome::Done,
            health: None,
            recap: None,
        }
    }

    pub fn entered(&self, stage: Stage) -> bool {
        self.visited.contains(&stage)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Outcome::Done)
    }

    /// Reached `Done` and every required endpoint (if probed) is healthy
    pub fn is_success(&self) -> bool {
        self.exit_code() == exit_code::OK
    }

    pub fn error(&self) -> Option<(Stage, &PipelineError)> {
        match &self.outcome {
            Outcome::Failed { stage, error } => Some((*stage, error)),
            _ => None,
        }
    }

    /// Unhealthy required endpoints of a run that otherwise reached `Done`.
    /// Verification never stops the pipeline, it only decides the exit code.
    pub fn verification_failure(&self) -> Option<PipelineError> {
        match (&self.outcome, &self.health) {
            (Outcome::Done, Some(health)) if !health.healthy() => {
                Some(PipelineError::Verification {
                    unhealthy: health.unhealthy_required(),
                })
            }
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            Outcome::Failed { error, .. } => error.exit_code(),
            Outcome::Cancelled => exit_code::CANCELLED,
            Outcome::Done => self
                .verification_failure()
                .map_or(exit_code::OK, |failure| failure.exit_code()),
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
