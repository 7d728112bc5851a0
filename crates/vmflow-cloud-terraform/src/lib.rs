//! Terraform driver for vmflow
//!
//! Implements [`vmflow_cloud::InfraDriver`] on top of the `terraform` CLI.
//! The provisioning configuration (`*.tf`) is owned by the project; this
//! crate only runs it and reads its outputs.
//!
//! # Requirements
//!
//! - `terraform` must be installed and on PATH
//! - Provider credentials are taken from the environment by terraform itself
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vmflow_cloud::{InfraDriver, InfraVars};
//! use vmflow_cloud_terraform::TerraformDriver;
//! use vmflow_core::SystemRunner;
//!
//! let driver = TerraformDriver::new(Arc::new(SystemRunner::new()), "terraform", ".vmflow/plan.tfplan");
//!
//! let plan = driver.plan(&InfraVars::from_config(&cfg)).await?;
//! if plan.has_changes {
//!     let outputs = driver.apply(&plan).await?;
//! }
//! ```

pub mod driver;
pub mod error;
pub mod terraform;

pub use driver::TerraformDriver;
pub use error::{Result, TerraformError};
pub use terraform::{OutputValue, PlanOutcome, Terraform};
