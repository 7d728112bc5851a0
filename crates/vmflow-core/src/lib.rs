//! vmflow core
//!
//! Shared building blocks for the deployment pipeline:
//!
//! - [`config`]: the immutable [`RunConfiguration`] and its resolver
//! - [`secrets`]: generate-once credentials
//! - [`envfile`]: the `KEY=VALUE` file both of them read and write
//! - [`exec`]: the process seam every collaborator wrapper goes through
//! - [`fs`]: atomic writes for shared state files

pub mod config;
pub mod envfile;
pub mod error;
pub mod exec;
pub mod fs;
pub mod secrets;

pub use config::{
    ConfigSummary, Defaults, GatewayMode, MainNetwork, NetworkMode, ResolvedEnvironment,
    RunConfiguration, Secrets, resolve, resolve_from_path,
};
pub use envfile::EnvFile;
pub use error::{CoreError, Result};
pub use exec::{CommandOutput, CommandRunner, Invocation, SystemRunner};
