//! Command lines for the tools Dreamer drives.
//!
//! [`RunConfig`] and [`TerraformRunConfig`] build shell command lines from
//! arguments and environment variables; [`terraform`] composes the planner
//! steps against store-backed state files; [`run`] executes a command line
//! through `sh -c`.

pub mod config;
pub mod error;
pub mod exec;
pub mod quote;
pub mod terraform;

pub use config::{EnvValue, Environment, RunConfig, TerraformRunConfig};
pub use error::{RunError, RunResult};
pub use exec::run;
pub use quote::{join_quoted, quote};
pub use terraform::{Step, StepFiles};
