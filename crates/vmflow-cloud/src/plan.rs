//! Plan and destroy result types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A saved plan ready to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanHandle {
    /// Saved plan artifact consumed by `apply`
    pub path: PathBuf,

    /// Counts of planned changes
    pub summary: PlanSummary,

    /// Whether applying would change anything
    pub has_changes: bool,
}

impl PlanHandle {
    pub fn new(path: impl Into<PathBuf>, summary: PlanSummary, has_changes: bool) -> Self {
        Self {
            path: path.into(),
            summary,
            has_changes,
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl PlanSummary {
    /// Parse `Plan: 1 to add, 0 to change, 0 to destroy.` from backend output.
    ///
    /// Output without such a line (e.g. "No changes.") yields all zeros.
    pub fn parse(text: &str) -> Self {
        let Some(line) = text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("Plan:"))
        else {
            return Self::default();
        };

        let mut summary = Self::default();
        for part in line.trim_start_matches("Plan:").split(',') {
            let mut words = part.split_whitespace();
            let count = words.next().and_then(|n| n.parse::<usize>().ok());
            let kind = words.nth(1).map(|k| k.trim_end_matches('.'));
            match (count, kind) {
                (Some(n), Some("add")) => summary.add = n,
                (Some(n), Some("change")) => summary.change = n,
                (Some(n), Some("destroy")) => summary.destroy = n,
                _ => {}
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.add == 0 && self.change == 0 && self.destroy == 0
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

/// Result of a best-effort destroy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestroyReport {
    /// Resources confirmed removed
    pub removed: Vec<String>,

    /// Resources that could not be removed
    pub failed: Vec<ResourceFailure>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl DestroyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_removed(&mut self, resource: impl Into<String>) {
        self.removed.push(resource.into());
    }

    pub fn add_failure(&mut self, resource: impl Into<String>, error: impl Into<String>) {
        self.failed.push(ResourceFailure {
            resource: resource.into(),
            error: error.into(),
        });
    }

    pub fn remaining(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.resource.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub resource: String,
    pub error: String,
}
