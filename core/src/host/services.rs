//! Service control through `sc.exe` and startup configuration through
//! `reg.exe`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ServiceManager, ServiceState, StartupStore};
use crate::error::{HostError, Result};
use crate::exec::{CommandRunner, CommandSpec};

const SC: &str = "sc.exe";
const REG: &str = "reg.exe";

/// `ERROR_SERVICE_DOES_NOT_EXIST`
const EXIT_SERVICE_MISSING: i32 = 1060;
/// `ERROR_SERVICE_ALREADY_RUNNING`
const EXIT_ALREADY_RUNNING: i32 = 1056;

/// `Start` value for `SERVICE_AUTO_START`.
const AUTO_START: &str = "2";

const SERVICES_KEY: &str = r"HKLM\SYSTEM\CurrentControlSet\Services";

pub struct ScServiceManager {
    runner: Arc<dyn CommandRunner>,
}

impl ScServiceManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ServiceManager for ScServiceManager {
    async fn service_state(&self, name: &str) -> Result<ServiceState> {
        let output = self
            .runner
            .run(&CommandSpec::new(SC).args(["query", name]))
            .await?;
        if output.code == Some(EXIT_SERVICE_MISSING) {
            return Err(HostError::ServiceMissing {
                name: name.to_string(),
            });
        }
        let output = output.into_success(SC)?;
        parse_service_state(&output.stdout)
            .ok_or_else(|| HostError::parse(format!("state of service {name}"), output.stdout))
    }

    async fn start_service(&self, name: &str) -> Result<()> {
        let output = self
            .runner
            .run(&CommandSpec::new(SC).args(["start", name]))
            .await?;
        match output.code {
            Some(0) | Some(EXIT_ALREADY_RUNNING) => Ok(()),
            Some(EXIT_SERVICE_MISSING) => Err(HostError::ServiceMissing {
                name: name.to_string(),
            }),
            _ => Err(HostError::CommandFailed {
                program: SC.to_string(),
                code: output.code_or_signal(),
                output: output.combined(),
            }),
        }
    }
}

/// `STATE              : 4  RUNNING` → `RUNNING`
fn parse_service_state(stdout: &str) -> Option<ServiceState> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("state") {
            return None;
        }
        let name = value.split_whitespace().nth(1)?;
        if name.eq_ignore_ascii_case("running") {
            Some(ServiceState::Running)
        } else {
            Some(ServiceState::NotRunning(name.to_string()))
        }
    })
}

pub struct RegistryStartupStore {
    runner: Arc<dyn CommandRunner>,
}

impl RegistryStartupStore {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl StartupStore for RegistryStartupStore {
    async fn set_automatic_start(&self, service: &str) -> Result<()> {
        let key = format!(r"{SERVICES_KEY}\{service}");
        let spec = CommandSpec::new(REG)
            .arg("add")
            .arg(key)
            .args(["/v", "Start", "/t", "REG_DWORD", "/d", AUTO_START, "/f"]);
        self.runner.run(&spec).await?.into_success(REG)?;
        Ok(())
    }
}
