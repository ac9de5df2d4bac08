//! `hostfix` command line.
//!
//! Parses flags, opens the run log, wires tracing to console and log file,
//! loads configuration and drives one [`Orchestrator`] run.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use hostfix_core::config::{ConfigError, RepairConfig};
use hostfix_core::environment::{HostEnvironment, RunPaths};
use hostfix_core::report;
use hostfix_core::{HostServices, Orchestrator, ProcessRunner, RunSummary};
use hostfix_runlog::{HhMmSs, RunLog};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Back up container runtime state, then repair the Linux subsystem and the
/// container runtime services.
#[derive(Debug, Parser)]
#[command(name = "hostfix", version)]
pub struct Cli {
    /// Configuration file (defaults to $HOSTFIX_CONFIG or the user config
    /// directory).
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not back up containers and volumes before repairing.
    #[arg(long = "skip-backup")]
    pub skip_backup: bool,

    /// Directory receiving container and volume archives.
    #[arg(long = "backup-dir", value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Log file (defaults to a timestamped file on the desktop).
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Upper bound for each repair step, in seconds.
    #[arg(
        long = "step-timeout",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub step_timeout: Option<u64>,
}

impl Cli {
    /// Read the configuration file named by `--config`, or the default
    /// location.
    pub fn load_config(&self) -> Result<RepairConfig, ConfigError> {
        match &self.config {
            Some(path) => RepairConfig::load_from_path(path),
            None => RepairConfig::load(),
        }
    }

    /// Flags win over file values.
    pub fn apply_overrides(&self, config: &mut RepairConfig) {
        if self.skip_backup {
            config.backup.enabled = false;
        }
        if let Some(dir) = &self.backup_dir {
            config.backup.directory = Some(dir.clone());
        }
        if let Some(secs) = self.step_timeout {
            config.timeouts.step_secs = secs;
        }
    }

    pub fn log_path(&self, paths: &RunPaths) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| paths.log_file.clone())
    }
}

/// Backup directory for this run: the configured one or the timestamped
/// desktop default.
pub fn backup_dir(config: &RepairConfig, paths: &RunPaths) -> PathBuf {
    config
        .backup
        .directory
        .clone()
        .unwrap_or_else(|| paths.backup_dir.clone())
}

/// Console layer on stderr plus, when available, a plain-text layer
/// appending to the run log. Both use `HH:MM:SS` timestamps.
pub fn init_tracing(log: Option<&RunLog>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(HhMmSs)
        .with_target(false);

    let file = log.map(|log| {
        tracing_subscriber::fmt::layer()
            .with_writer(log.make_writer())
            .with_timer(HhMmSs)
            .with_target(false)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

/// One full run. Expects the process to be elevated.
pub async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let started_at = Local::now();
    let env = HostEnvironment::detect();
    let paths = RunPaths::for_run(&env, started_at);
    let log_path = cli.log_path(&paths);

    let log = RunLog::create(&log_path, &env.user_name, started_at);
    init_tracing(log.as_ref().ok())?;
    match &log {
        Ok(log) => tracing::info!("logging to {}", log.path().display()),
        Err(e) => tracing::warn!("continuing without a log file: {e}"),
    }
    tracing::info!(
        "hostfix v{} started by {} at {}",
        env!("CARGO_PKG_VERSION"),
        env.user_name,
        started_at.format("%Y-%m-%d %H:%M:%S")
    );

    let mut config = cli.load_config().unwrap_or_else(|e| {
        tracing::warn!("{e}; using default configuration");
        RepairConfig::default()
    });
    cli.apply_overrides(&mut config);

    let archive_dir = backup_dir(&config, &paths);
    if config.backup.enabled {
        tracing::info!("backups go to {}", archive_dir.display());
    }

    let runner = Arc::new(ProcessRunner::new(config.timeouts.command()));
    let host = HostServices::system(&config, runner);
    let summary = Orchestrator::new(host, config, env, archive_dir).run().await;

    tracing::info!(
        ok = summary.count(hostfix_core::StepStatus::Ok),
        warnings = summary.count(hostfix_core::StepStatus::Warning),
        failed = summary.count(hostfix_core::StepStatus::Failed),
        "run finished"
    );
    tracing::info!("{}", report::reboot_recommendation(&summary));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn paths() -> RunPaths {
        RunPaths {
            log_file: PathBuf::from("/desk/hostfix_20260314_092653.log"),
            backup_dir: PathBuf::from("/desk/docker_backup_20260314_092653"),
        }
    }

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::try_parse_from([
            "hostfix",
            "--skip-backup",
            "--backup-dir",
            "/mnt/archive",
            "--step-timeout",
            "60",
        ])
        .unwrap();
        let mut config = RepairConfig::default();
        cli.apply_overrides(&mut config);

        assert!(!config.backup.enabled);
        assert_eq!(config.timeouts.step_secs, 60);
        assert_eq!(backup_dir(&config, &paths()), PathBuf::from("/mnt/archive"));
    }

    #[test]
    fn defaults_use_timestamped_desktop_paths() {
        let cli = Cli::try_parse_from(["hostfix"]).unwrap();
        let mut config = RepairConfig::default();
        cli.apply_overrides(&mut config);

        assert!(config.backup.enabled);
        assert_eq!(cli.log_path(&paths()), paths().log_file);
        assert_eq!(backup_dir(&config, &paths()), paths().backup_dir);
    }

    #[test]
    fn log_file_flag_wins() {
        let cli = Cli::try_parse_from(["hostfix", "--log-file", "/tmp/run.log"]).unwrap();
        assert_eq!(cli.log_path(&paths()), PathBuf::from("/tmp/run.log"));
    }

    #[test]
    fn zero_step_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["hostfix", "--step-timeout", "0"]).is_err());
    }

    #[test]
    fn explicit_config_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostfix.toml");
        std::fs::write(&path, "[subsystem]\ndefault_version = 1\n").unwrap();
        let cli = Cli::try_parse_from(["hostfix", "--config", path.to_str().unwrap()]).unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.subsystem.default_version, 1);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostfix.toml");
        std::fs::write(&path, "[subsystem]\ndefault_version = 7\n").unwrap();
        let cli = Cli::try_parse_from(["hostfix", "--config", path.to_str().unwrap()]).unwrap();

        assert!(matches!(cli.load_config(), Err(ConfigError::Invalid(_))));
    }
}
