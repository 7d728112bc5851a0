//! vmflow network bootstrap
//!
//! Brings up the encrypted point-to-point tunnel between the operator
//! machine and the provisioned host.
//!
//! The orchestrator talks to [`TunnelDriver`]; [`WireGuard`] drives
//! `wg-quick` through a [`vmflow_core::CommandRunner`].

pub mod config;
pub mod driver;
pub mod error;
pub mod wireguard;

pub use config::TunnelConfig;
pub use driver::TunnelDriver;
pub use error::{Result, TunnelError};
pub use wireguard::{DEFAULT_INTERFACE, WireGuard};
