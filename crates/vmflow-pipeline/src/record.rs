//! Deployment record
//!
//! Manages the `.vmflow/deployment.json` file, a summary of the last
//! successful service deployment. It is written for display and audit only;
//! no pipeline decision ever reads it back.

use crate::addresses::AddressBook;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use vmflow_ansible::Role;
use vmflow_core::{ConfigSummary, RunConfiguration};

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Record file version
    pub version: u32,

    pub deployed_at: DateTime<Utc>,

    /// Resolved configuration without secrets
    pub config: ConfigSummary,

    pub addresses: AddressBook,

    /// Roles applied by the run that wrote this record
    pub roles: Vec<Role>,
}

impl DeploymentRecord {
    pub fn new(cfg: &RunConfiguration, addresses: AddressBook, roles: Vec<Role>) -> Self {
        Self {
            version: RECORD_VERSION,
            deployed_at: Utc::now(),
            config: cfg.summary(),
            addresses,
            roles,
        }
    }
}

/// Reads and writes the deployment record
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last record, `None` when nothing was deployed yet
    pub async fn load(&self) -> Result<Option<DeploymentRecord>> {
        if !self.path.exists() {
            tracing::debug!("Deployment record not found");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let record: DeploymentRecord = serde_json::from_str(&content)
            .map_err(|e| PipelineError::Internal(format!("{}: {}", self.path.display(), e)))?;

        if record.version > RECORD_VERSION {
            return Err(PipelineError::Internal(format!(
                "Deployment record version {} is newer than supported version {}",
                record.version, RECORD_VERSION
            )));
        }

        Ok(Some(record))
    }

    /// Replace the record atomically
    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        vmflow_core::fs::write_atomic(&self.path, content.as_bytes())?;

        tracing::debug!("Saved deployment record with {} role(s)", record.roles.len());
        Ok(())
    }
}
