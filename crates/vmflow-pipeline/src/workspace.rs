//! On-disk layout of a vmflow project

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "vmflow.env";
pub const STATE_DIR: &str = ".vmflow";
pub const INVENTORY_FILE: &str = "inventory.yml";
pub const RECORD_FILE: &str = "deployment.json";
pub const PLAN_FILE: &str = "plan.tfplan";
pub const WIREGUARD_DIR: &str = "wireguard";
pub const TERRAFORM_DIR: &str = "terraform";
pub const ANSIBLE_DIR: &str = "ansible";

/// Paths of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    project_dir: PathBuf,
    config_path: PathBuf,
}

impl Workspace {
    /// Relative paths are resolved against the current directory once, since
    /// terraform and ansible run from their own subdirectories.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let project_dir = std::path::absolute(&project_dir).unwrap_or(project_dir);
        let config_path = project_dir.join(CONFIG_FILE);
        Self {
            project_dir,
            config_path,
        }
    }

    /// Use a config file outside the default location. Relative paths are
    /// taken relative to the project directory.
    pub fn with_config(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = self.project_dir.join(path);
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(STATE_DIR)
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.state_dir().join(INVENTORY_FILE)
    }

    pub fn record_path(&self) -> PathBuf {
        self.state_dir().join(RECORD_FILE)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.state_dir().join(PLAN_FILE)
    }

    pub fn wireguard_dir(&self) -> PathBuf {
        self.state_dir().join(WIREGUARD_DIR)
    }

    pub fn terraform_dir(&self) -> PathBuf {
        self.project_dir.join(TERRAFORM_DIR)
    }

    pub fn ansible_dir(&self) -> PathBuf {
        self.project_dir.join(ANSIBLE_DIR)
    }

    /// Generated artifacts removed by `destroy`. The config file holds the
    /// operator's settings and secrets and is kept.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        vec![
            self.inventory_path(),
            self.record_path(),
            self.plan_path(),
            self.wireguard_dir(),
        ]
    }
}
