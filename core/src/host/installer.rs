//! Kernel update download and silent install.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::KernelInstaller;
use crate::error::{HostError, Result};
use crate::exec::{CommandRunner, CommandSpec};

const MSIEXEC: &str = "msiexec.exe";

pub struct MsiKernelInstaller {
    runner: Arc<dyn CommandRunner>,
    client: reqwest::Client,
}

impl MsiKernelInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hostfix/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { runner, client }
    }
}

#[async_trait]
impl KernelInstaller for MsiKernelInstaller {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let download_err = |message: String| HostError::Download {
            url: url.to_string(),
            message,
        };

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| download_err(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HostError::io("failed to create download directory", parent, e))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| HostError::io("failed to write installer", dest, e))?;

        tracing::debug!(url, dest = %dest.display(), size = bytes.len(), "installer downloaded");
        Ok(())
    }

    async fn install(&self, package: &Path) -> Result<i32> {
        let spec = CommandSpec::new(MSIEXEC)
            .arg("/i")
            .arg(package.display().to_string())
            .args(["/quiet", "/norestart"]);
        let output = self.runner.run(&spec).await?;
        Ok(output.code_or_signal())
    }
}
