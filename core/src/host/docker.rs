//! Container runtime CLI (`docker`).

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{HelperSpec, RuntimeCli};
use crate::error::{HostError, Result};
use crate::exec::{CommandRunner, CommandSpec};

/// Keeps the helper alive until it is removed.
const HELPER_IDLE_COMMAND: [&str; 2] = ["sleep", "infinity"];

pub struct DockerCli {
    cli: String,
    runner: Arc<dyn CommandRunner>,
    /// Bound for `export` and in-helper `tar`, which scale with data size.
    archive_timeout: Option<Duration>,
}

impl DockerCli {
    pub fn new(cli: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: cli.into(),
            runner,
            archive_timeout: None,
        }
    }

    pub fn with_archive_timeout(mut self, limit: Duration) -> Self {
        self.archive_timeout = Some(limit);
        self
    }

    fn archive_command(&self) -> CommandSpec {
        match self.archive_timeout {
            Some(limit) => self.command().with_timeout(limit),
            None => self.command(),
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.cli.as_str())
    }

    async fn run_ok(&self, spec: CommandSpec) -> Result<String> {
        let output = self.runner.run(&spec).await?.into_success(&self.cli)?;
        Ok(output.stdout)
    }

    /// Arguments for `docker run` that start the backup helper.
    fn helper_run_args(spec: &HelperSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--name".to_string(),
            spec.name.clone(),
        ];
        for mount in &spec.volumes {
            args.push("--volume".to_string());
            args.push(format!("{}:{}:ro", mount.volume, mount.target));
        }
        args.push("--volume".to_string());
        args.push(format!(
            "{}:{}",
            spec.archive_dir.display(),
            spec.archive_mount
        ));
        args.push(spec.image.clone());
        args.extend(HELPER_IDLE_COMMAND.iter().map(ToString::to_string));
        args
    }
}

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[async_trait]
impl RuntimeCli for DockerCli {
    async fn list_containers(&self) -> Result<Vec<String>> {
        let stdout = self
            .run_ok(self.command().args(["ps", "--all", "--format", "{{.Names}}"]))
            .await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        let stdout = self
            .run_ok(self.command().args(["volume", "ls", "--format", "{{.Name}}"]))
            .await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn export_container(&self, name: &str, archive: &Path) -> Result<()> {
        let spec = self
            .archive_command()
            .args(["export", "--output"])
            .arg(archive.display().to_string())
            .arg(name);
        self.run_ok(spec).await?;
        Ok(())
    }

    async fn start_helper(&self, spec: &HelperSpec) -> Result<()> {
        self.run_ok(self.command().args(Self::helper_run_args(spec)))
            .await?;
        Ok(())
    }

    async fn helper_dir_exists(&self, helper: &str, path: &str) -> Result<bool> {
        let spec = self.command().args(["exec", helper, "test", "-d", path]);
        let output = self.runner.run(&spec).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(HostError::CommandFailed {
                program: self.cli.clone(),
                code: output.code_or_signal(),
                output: output.combined(),
            }),
        }
    }

    async fn helper_archive(&self, helper: &str, source_dir: &str, archive: &str) -> Result<()> {
        let spec = self.archive_command().args([
            "exec", helper, "tar", "-czf", archive, "-C", source_dir, ".",
        ]);
        self.run_ok(spec).await?;
        Ok(())
    }

    async fn remove_helper(&self, helper: &str) -> Result<()> {
        self.run_ok(self.command().args(["rm", "--force", helper]))
            .await?;
        Ok(())
    }

    fn remove_helper_blocking(&self, helper: &str) {
        let status = std::process::Command::new(&self.cli)
            .args(["rm", "--force", helper])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(helper, code = ?status.code(), "helper removal failed"),
            Err(e) => tracing::warn!(helper, "helper removal could not run: {e}"),
        }
    }

    async fn server_version(&self) -> Result<String> {
        let stdout = self
            .run_ok(self.command().args(["version", "--format", "{{.Server.Version}}"]))
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn os_type(&self) -> Result<String> {
        let stdout = self
            .run_ok(self.command().args(["info", "--format", "{{.OSType}}"]))
            .await?;
        Ok(stdout.trim().to_string())
    }
}
