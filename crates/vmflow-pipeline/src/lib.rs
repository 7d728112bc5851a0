//! vmflow deployment pipeline
//!
//! Drives a single VM from nothing to verified services:
//!
//! ```text
//! Init -> PrereqChecked -> SecretsResolved -> InfraApplied -> InventoryGenerated
//!      -> TunnelUp -> HostsReachable -> ServicesDeployed -> Verified -> Done
//! ```
//!
//! Every stage probes its precondition before acting, so re-running after
//! an interruption converges instead of repeating work. Partial entries
//! (`infra`, `services`, `verify`, ...) run a prefix or a slice of the same
//! machine, and destroy runs its own `ConfirmIntent -> InfraDestroyed ->
//! ArtifactsRemoved` branch.

pub mod addresses;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod stage;
pub mod verify;
pub mod workspace;

pub use addresses::{AddressBook, DnsRecord};
pub use error::{PipelineError, Result, exit_code};
pub use orchestrator::{
    Collaborators, Confirm, Decline, Entry, Observer, Orchestrator, SilentObserver,
};
pub use record::{DeploymentRecord, RecordStore};
pub use stage::{Outcome, RunReport, Stage, StageStatus};
pub use verify::{
    Endpoint, HealthReport, HealthSummary, NetProber, Probe, Prober, Verifier, default_endpoints,
};
pub use workspace::Workspace;
