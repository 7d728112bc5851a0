//! vmflow infrastructure layer
//!
//! This crate provides the provisioning-backend abstraction for vmflow.
//! The orchestrator only talks to [`InfraDriver`]; concrete backends live in
//! their own crates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 vmflow pipeline                  │
//! │          (InfraApplied / InfraDestroyed)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  vmflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │           Driver Abstraction             │   │
//! │  │  trait InfraDriver { ... }               │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Plan/Destroy │  │   Outputs    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────────────┐
//! │ vmflow-cloud-terraform │
//! └────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod outputs;
pub mod plan;

// Re-exports
pub use driver::{InfraDriver, InfraVars, Readiness};
pub use error::{CloudError, Result};
pub use outputs::InfrastructureOutputs;
pub use plan::{DestroyReport, PlanHandle, PlanSummary, ResourceFailure};
