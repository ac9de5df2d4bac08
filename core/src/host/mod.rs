//! Host collaborators.
//!
//! Each trait is the contract a repair step relies on; the submodules
//! implement them over the stock Windows tools through a
//! [`CommandRunner`]. Tests substitute in-memory fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RepairConfig;
use crate::error::Result;
use crate::exec::{CommandOutput, CommandRunner};

pub mod dism;
pub mod docker;
pub mod installer;
pub mod services;
pub mod wsl;

#[cfg(test)]
pub(crate) mod testing;

pub use dism::DismFeatureManager;
pub use docker::DockerCli;
pub use installer::MsiKernelInstaller;
pub use services::{RegistryStartupStore, ScServiceManager};
pub use wsl::WslCli;

/// Install state of an optional OS feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureState {
    Enabled,
    /// Enabled, waiting for a restart to take effect.
    EnablePending,
    Disabled,
    Other(String),
}

impl FeatureState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled | Self::EnablePending)
    }
}

/// Run state of an installed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    /// Any other state, carrying the raw state name.
    NotRunning(String),
}

/// OS feature manager (query and enable).
#[async_trait]
pub trait FeatureManager: Send + Sync {
    async fn feature_state(&self, name: &str) -> Result<FeatureState>;

    /// Enable with all parent features, without restarting.
    async fn enable_feature(&self, name: &str) -> Result<()>;
}

/// Service control manager.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Fails with [`HostError::ServiceMissing`](crate::error::HostError::ServiceMissing)
    /// when the service is not installed.
    async fn service_state(&self, name: &str) -> Result<ServiceState>;

    async fn start_service(&self, name: &str) -> Result<()>;
}

/// Persisted service configuration.
#[async_trait]
pub trait StartupStore: Send + Sync {
    /// Write the automatic startup mode for `service`.
    async fn set_automatic_start(&self, service: &str) -> Result<()>;
}

/// Subsystem command line.
#[async_trait]
pub trait SubsystemCli: Send + Sync {
    /// Returns the raw output whatever the exit code; errors only when the
    /// CLI could not be run.
    async fn set_default_version(&self, version: u8) -> Result<CommandOutput>;

    async fn status(&self) -> Result<String>;
}

/// A named volume mounted into the backup helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub volume: String,
    pub target: String,
}

/// Everything needed to start the volume backup helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperSpec {
    pub name: String,
    pub image: String,
    pub volumes: Vec<VolumeMount>,
    /// Host directory receiving the archives.
    pub archive_dir: PathBuf,
    /// Where `archive_dir` is mounted inside the helper.
    pub archive_mount: String,
}

/// Container runtime command line.
#[async_trait]
pub trait RuntimeCli: Send + Sync {
    /// Names of all containers, running and stopped.
    async fn list_containers(&self) -> Result<Vec<String>>;

    async fn list_volumes(&self) -> Result<Vec<String>>;

    async fn export_container(&self, name: &str, archive: &Path) -> Result<()>;

    /// Start the helper detached; it stays up until removed.
    async fn start_helper(&self, spec: &HelperSpec) -> Result<()>;

    /// Whether `path` exists as a directory inside the helper.
    async fn helper_dir_exists(&self, helper: &str, path: &str) -> Result<bool>;

    /// Write a gzip tar of `source_dir` to `archive`, both helper paths.
    async fn helper_archive(&self, helper: &str, source_dir: &str, archive: &str) -> Result<()>;

    async fn remove_helper(&self, helper: &str) -> Result<()>;

    /// Synchronous removal for drop paths where nothing can be awaited.
    fn remove_helper_blocking(&self, helper: &str);

    async fn server_version(&self) -> Result<String>;

    /// OS type the engine reports (`linux` or `windows`).
    async fn os_type(&self) -> Result<String>;
}

/// Kernel update installer.
#[async_trait]
pub trait KernelInstaller: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Run a silent install and return the installer exit code.
    async fn install(&self, package: &Path) -> Result<i32>;
}

/// The full set of collaborators a run talks to.
#[derive(Clone)]
pub struct HostServices {
    pub features: Arc<dyn FeatureManager>,
    pub services: Arc<dyn ServiceManager>,
    pub startup: Arc<dyn StartupStore>,
    pub subsystem: Arc<dyn SubsystemCli>,
    pub runtime: Arc<dyn RuntimeCli>,
    pub kernel: Arc<dyn KernelInstaller>,
}

impl HostServices {
    /// Collaborators backed by the stock Windows tools.
    pub fn system(config: &RepairConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            features: Arc::new(DismFeatureManager::new(Arc::clone(&runner))),
            services: Arc::new(ScServiceManager::new(Arc::clone(&runner))),
            startup: Arc::new(RegistryStartupStore::new(Arc::clone(&runner))),
            subsystem: Arc::new(WslCli::new(Arc::clone(&runner))),
            runtime: Arc::new(
                DockerCli::new(config.runtime.cli.clone(), Arc::clone(&runner))
                    .with_archive_timeout(config.timeouts.archive()),
            ),
            kernel: Arc::new(MsiKernelInstaller::new(runner)),
        }
    }
}
