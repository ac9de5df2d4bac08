#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Stateful in-memory host shared by the orchestrator scenarios.
//!
//! One `FakeHost` implements every collaborator trait so mutations made by
//! one step are visible to later steps and to a second run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hostfix_core::config::RepairConfig;
use hostfix_core::environment::HostEnvironment;
use hostfix_core::error::{HostError, Result};
use hostfix_core::exec::CommandOutput;
use hostfix_core::host::{
    FeatureManager, FeatureState, HelperSpec, HostServices, KernelInstaller, RuntimeCli,
    ServiceManager, ServiceState, StartupStore, SubsystemCli,
};
use tempfile::TempDir;

pub const MANAGER: &str = "LxssManager";
pub const COMPUTE: &str = "vmcompute";
pub const RUNTIME_SERVICE: &str = "com.docker.service";
pub const WSL_FEATURE: &str = "Microsoft-Windows-Subsystem-Linux";
pub const VMP_FEATURE: &str = "VirtualMachinePlatform";

pub struct HostState {
    pub features: BTreeMap<String, FeatureState>,
    pub failing_features: BTreeSet<String>,
    /// Absent entries are services that are not installed.
    pub services: BTreeMap<String, ServiceState>,
    pub automatic_start: BTreeSet<String>,
    /// `false` makes every runtime CLI call fail as if the binary were absent.
    pub runtime_reachable: bool,
    pub containers: Vec<String>,
    pub volumes: Vec<String>,
    /// `docker volume ls` exits non-zero while the daemon still answers.
    pub volume_listing_fails: bool,
    /// Containers whose export writes a partial archive and then fails.
    pub failing_exports: BTreeSet<String>,
    /// `docker run` for the backup helper exits non-zero.
    pub helper_start_fails: bool,
    /// Volumes whose mount point the helper cannot resolve.
    pub unmountable_volumes: BTreeSet<String>,
    pub live_helpers: BTreeSet<String>,
    pub removed_helpers: Vec<String>,
    /// Delay inside each volume archive, for timeout scenarios.
    pub archive_delay: Option<Duration>,
    pub kernel_file: PathBuf,
    pub install_exit_code: i32,
    pub set_version_output: CommandOutput,
    pub os_type: String,
    /// Mutating calls in the order they happened.
    pub events: Vec<String>,
}

pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    /// A host that is already fully repaired.
    pub fn healthy(kernel_file: PathBuf) -> Arc<Self> {
        let features = [WSL_FEATURE, VMP_FEATURE]
            .into_iter()
            .map(|name| (name.to_string(), FeatureState::Enabled))
            .collect();
        let services = [MANAGER, COMPUTE, RUNTIME_SERVICE]
            .into_iter()
            .map(|name| (name.to_string(), ServiceState::Running))
            .collect();
        Arc::new(Self {
            state: Mutex::new(HostState {
                features,
                failing_features: BTreeSet::new(),
                services,
                automatic_start: BTreeSet::new(),
                runtime_reachable: true,
                containers: Vec::new(),
                volumes: Vec::new(),
                volume_listing_fails: false,
                failing_exports: BTreeSet::new(),
                helper_start_fails: false,
                unmountable_volumes: BTreeSet::new(),
                live_helpers: BTreeSet::new(),
                removed_helpers: Vec::new(),
                archive_delay: None,
                kernel_file,
                install_exit_code: 0,
                set_version_output: CommandOutput {
                    code: Some(0),
                    stdout: "The operation completed successfully.".to_string(),
                    stderr: String::new(),
                },
                os_type: "linux".to_string(),
                events: Vec::new(),
            }),
        })
    }

    pub fn with<F: FnOnce(&mut HostState)>(self: &Arc<Self>, f: F) -> Arc<Self> {
        f(&mut self.state.lock().unwrap());
        Arc::clone(self)
    }

    pub fn state<R>(&self, f: impl FnOnce(&HostState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn services(self: &Arc<Self>) -> HostServices {
        HostServices {
            features: self.clone(),
            services: self.clone(),
            startup: self.clone(),
            subsystem: self.clone(),
            runtime: self.clone(),
            kernel: self.clone(),
        }
    }

    fn event(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }

    fn runtime_check(&self) -> Result<()> {
        if self.state.lock().unwrap().runtime_reachable {
            Ok(())
        } else {
            Err(HostError::ProgramNotFound {
                program: "docker".to_string(),
            })
        }
    }
}

#[async_trait]
impl FeatureManager for FakeHost {
    async fn feature_state(&self, name: &str) -> Result<FeatureState> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .features
            .get(name)
            .cloned()
            .unwrap_or(FeatureState::Disabled))
    }

    async fn enable_feature(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("feature:enable {name}"));
        if state.failing_features.contains(name) {
            return Err(HostError::CommandFailed {
                program: "dism.exe".to_string(),
                code: 50,
                output: "Feature name is unknown.".to_string(),
            });
        }
        state
            .features
            .insert(name.to_string(), FeatureState::EnablePending);
        Ok(())
    }
}

#[async_trait]
impl ServiceManager for FakeHost {
    async fn service_state(&self, name: &str) -> Result<ServiceState> {
        self.state
            .lock()
            .unwrap()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::ServiceMissing {
                name: name.to_string(),
            })
    }

    async fn start_service(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("service:start {name}"));
        match state.services.get_mut(name) {
            Some(service) => {
                *service = ServiceState::Running;
                Ok(())
            }
            None => Err(HostError::ServiceMissing {
                name: name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl StartupStore for FakeHost {
    async fn set_automatic_start(&self, service: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("startup:auto {service}"));
        state.automatic_start.insert(service.to_string());
        Ok(())
    }
}

#[async_trait]
impl SubsystemCli for FakeHost {
    async fn set_default_version(&self, version: u8) -> Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("subsystem:set-version {version}"));
        Ok(state.set_version_output.clone())
    }

    async fn status(&self) -> Result<String> {
        Ok("Default Version: 2".to_string())
    }
}

#[async_trait]
impl RuntimeCli for FakeHost {
    async fn list_containers(&self) -> Result<Vec<String>> {
        self.runtime_check()?;
        Ok(self.state.lock().unwrap().containers.clone())
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        self.runtime_check()?;
        let state = self.state.lock().unwrap();
        if state.volume_listing_fails {
            return Err(HostError::CommandFailed {
                program: "docker".to_string(),
                code: 1,
                output: "error during connect: volume list interrupted".to_string(),
            });
        }
        Ok(state.volumes.clone())
    }

    async fn export_container(&self, name: &str, archive: &Path) -> Result<()> {
        self.runtime_check()?;
        self.event(format!("backup:export {name}"));
        std::fs::write(archive, format!("export of {name}"))
            .map_err(|e| HostError::io("write export", archive, e))?;
        if self.state.lock().unwrap().failing_exports.contains(name) {
            return Err(HostError::CommandFailed {
                program: "docker".to_string(),
                code: 1,
                output: format!("Error response from daemon: cannot export {name}"),
            });
        }
        Ok(())
    }

    async fn start_helper(&self, spec: &HelperSpec) -> Result<()> {
        self.runtime_check()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("backup:helper-start {}", spec.name));
        if state.helper_start_fails {
            return Err(HostError::CommandFailed {
                program: "docker".to_string(),
                code: 125,
                output: format!("Unable to find image '{}' locally", spec.image),
            });
        }
        state.live_helpers.insert(spec.name.clone());
        Ok(())
    }

    async fn helper_dir_exists(&self, helper: &str, path: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if !state.live_helpers.contains(helper) {
            return Err(HostError::CommandFailed {
                program: "docker".to_string(),
                code: 1,
                output: format!("No such container: {helper}"),
            });
        }
        let volume = path.rsplit('/').next().unwrap_or_default();
        Ok(!state.unmountable_volumes.contains(volume))
    }

    async fn helper_archive(&self, helper: &str, source_dir: &str, archive: &str) -> Result<()> {
        let delay = self.state.lock().unwrap().archive_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.event(format!("backup:archive {source_dir} -> {archive} via {helper}"));
        Ok(())
    }

    async fn remove_helper(&self, helper: &str) -> Result<()> {
        let was_live = self.state(|s| s.live_helpers.contains(helper));
        self.remove_helper_blocking(helper);
        if was_live {
            Ok(())
        } else {
            Err(HostError::CommandFailed {
                program: "docker".to_string(),
                code: 1,
                output: format!("Error response from daemon: No such container: {helper}"),
            })
        }
    }

    fn remove_helper_blocking(&self, helper: &str) {
        let mut state = self.state.lock().unwrap();
        state.live_helpers.remove(helper);
        state.removed_helpers.push(helper.to_string());
    }

    async fn server_version(&self) -> Result<String> {
        self.runtime_check()?;
        Ok("27.3.1".to_string())
    }

    async fn os_type(&self) -> Result<String> {
        self.runtime_check()?;
        Ok(self.state.lock().unwrap().os_type.clone())
    }
}

#[async_trait]
impl KernelInstaller for FakeHost {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.event(format!("kernel:download {url}"));
        std::fs::write(dest, b"msi").map_err(|e| HostError::io("write installer", dest, e))
    }

    async fn install(&self, package: &Path) -> Result<i32> {
        let (code, kernel_file) = {
            let mut state = self.state.lock().unwrap();
            state.events.push(format!("kernel:install {}", package.display()));
            (state.install_exit_code, state.kernel_file.clone())
        };
        if code == 0 {
            if let Some(parent) = kernel_file.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&kernel_file, b"kernel").unwrap();
        }
        Ok(code)
    }
}

/// Scratch host directories: a system root holding the kernel image and a
/// desktop receiving backups.
pub struct Sandbox {
    pub dir: TempDir,
    pub env: HostEnvironment,
    pub config: RepairConfig,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let env = HostEnvironment {
            user_profile: root.join("profile"),
            desktop: root.join("desktop"),
            temp_dir: root.join("temp"),
            system_root: root.join("windows"),
            user_name: "tester".to_string(),
        };
        std::fs::create_dir_all(&env.desktop).unwrap();
        std::fs::create_dir_all(&env.temp_dir).unwrap();
        Self {
            dir,
            env,
            config: RepairConfig::default(),
        }
    }

    pub fn kernel_file(&self) -> PathBuf {
        self.env.system_path(&self.config.kernel.path)
    }

    /// Make the kernel image present, as on a repaired host.
    pub fn install_kernel(&self) {
        let path = self.kernel_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"kernel").unwrap();
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.env.desktop.join("docker_backup_test")
    }
}
