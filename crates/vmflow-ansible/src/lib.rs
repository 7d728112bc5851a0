//! vmflow configuration layer
//!
//! - [`inventory`]: derives the Ansible inventory from infrastructure
//!   outputs and the run configuration
//! - [`vars`]: the variable bag passed to every configuration run
//! - [`ConfigDriver`] / [`Ansible`]: ping hosts and apply roles

pub mod ansible;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod role;
pub mod vars;

pub use ansible::Ansible;
pub use driver::{ConfigDriver, HostRecap, PingReport, PlayRecap};
pub use error::{AnsibleError, Result};
pub use inventory::{HostEntry, Inventory, default_ssh_key};
pub use role::Role;
pub use vars::VarBag;
