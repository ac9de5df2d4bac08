//! Subsystem CLI (`wsl.exe`).

use std::sync::Arc;

use async_trait::async_trait;

use super::SubsystemCli;
use crate::error::Result;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

const WSL: &str = "wsl.exe";

pub struct WslCli {
    runner: Arc<dyn CommandRunner>,
}

impl WslCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SubsystemCli for WslCli {
    async fn set_default_version(&self, version: u8) -> Result<CommandOutput> {
        let spec = CommandSpec::new(WSL)
            .arg("--set-default-version")
            .arg(version.to_string());
        self.runner.run(&spec).await
    }

    async fn status(&self) -> Result<String> {
        let output = self
            .runner
            .run(&CommandSpec::new(WSL).arg("--status"))
            .await?
            .into_success(WSL)?;
        Ok(output.combined())
    }
}
