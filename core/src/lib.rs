//! Pre-repair backup and idempotent repair of the Linux subsystem and the
//! container runtime that depends on it.
//!
//! The [`Orchestrator`] drives a fixed sequence of steps against the
//! [`HostServices`] collaborators and returns a [`RunSummary`].

pub mod backup;
pub mod config;
pub mod environment;
pub mod error;
pub mod exec;
pub mod host;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod steps;

pub use backup::{BackupManifest, BackupReport, BackupSubsystem};
pub use config::{ConfigError, RepairConfig};
pub use environment::{HostEnvironment, RunPaths};
pub use error::{HostError, Result};
pub use exec::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use host::HostServices;
pub use orchestrator::Orchestrator;
pub use outcome::{RunSummary, StepKind, StepOutcome, StepStatus};
