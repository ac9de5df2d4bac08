//! Repair configuration loading
//!
//! Loads configuration from `<config_dir>/hostfix/config.toml` (or the
//! `HOSTFIX_CONFIG` env var). Every field has a default, so an absent file
//! yields the stock checklist for WSL 2 and Docker Desktop.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RepairConfig {
    pub backup: BackupConfig,
    pub features: FeaturesConfig,
    pub kernel: KernelConfig,
    pub services: ServicesConfig,
    pub subsystem: SubsystemConfig,
    pub runtime: RuntimeConfig,
    pub timeouts: TimeoutConfig,
}

/// Pre-mutation backup of container-runtime state.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackupConfig {
    /// Run the backup stage before any repair
    pub enabled: bool,
    /// Image for the short-lived volume archiving container
    pub helper_image: String,
    /// Where volumes are mounted inside the helper
    pub volume_mount_root: String,
    /// Where the backup directory is mounted inside the helper
    pub archive_mount: String,
    /// Override for the backup directory (defaults to a timestamped
    /// directory on the desktop)
    pub directory: Option<PathBuf>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            helper_image: "alpine:3.20".to_string(),
            volume_mount_root: "/volumes".to_string(),
            archive_mount: "/backup".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Optional OS features that must be enabled
    pub names: Vec<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            names: vec![
                "Microsoft-Windows-Subsystem-Linux".to_string(),
                "VirtualMachinePlatform".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    /// Installer download location
    pub url: String,
    /// Kernel image whose presence means the update is installed. Relative
    /// paths are resolved against the system root.
    pub path: PathBuf,
    /// File name used for the downloaded installer in the temp directory
    pub installer_file_name: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            url: "https://wslstorestorage.blob.core.windows.net/wslblob/wsl_update_x64.msi"
                .to_string(),
            path: PathBuf::from("System32")
                .join("lxss")
                .join("tools")
                .join("kernel"),
            installer_file_name: "wsl_update_x64.msi".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServicesConfig {
    /// Subsystem services, started in order
    pub subsystem: Vec<String>,
    /// Container-runtime services, started in order
    pub runtime: Vec<String>,
    /// Subsystem manager whose startup mode is forced to automatic
    pub manager: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            subsystem: vec!["LxssManager".to_string(), "vmcompute".to_string()],
            runtime: vec!["com.docker.service".to_string()],
            manager: "LxssManager".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SubsystemConfig {
    /// Default subsystem version to enforce
    pub default_version: u8,
    /// Output fragment meaning the required features still await a restart
    pub feature_missing_marker: String,
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            default_version: 2,
            feature_missing_marker: "required feature is not installed".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Container runtime CLI
    pub cli: String,
    /// Engine OS type reported when the runtime uses the subsystem backend
    pub expected_os_type: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cli: "docker".to_string(),
            expected_os_type: "linux".to_string(),
        }
    }
}

/// Upper bounds on how long the run may block on the host.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Single external command
    pub command_secs: u64,
    /// One repair step
    pub step_secs: u64,
    /// One container export or volume archive
    pub archive_secs: u64,
    /// The whole backup stage
    pub backup_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 300,
            step_secs: 900,
            archive_secs: 2 * 60 * 60,
            backup_secs: 4 * 60 * 60,
        }
    }
}

impl TimeoutConfig {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn archive(&self) -> Duration {
        Duration::from_secs(self.archive_secs)
    }

    pub fn backup(&self) -> Duration {
        Duration::from_secs(self.backup_secs)
    }
}

impl RepairConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "HOSTFIX_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `HOSTFIX_CONFIG` environment variable
    /// 2. `<config_dir>/hostfix/config.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let cfg: RepairConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|d| d.join("hostfix").join(Self::DEFAULT_CONFIG_FILENAME))
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.subsystem.default_version, 1 | 2) {
            return Err(ConfigError::Invalid(format!(
                "subsystem.default_version must be 1 or 2, got {}",
                self.subsystem.default_version
            )));
        }

        if self.timeouts.command_secs == 0
            || self.timeouts.step_secs == 0
            || self.timeouts.archive_secs == 0
            || self.timeouts.backup_secs == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        if self.runtime.cli.trim().is_empty() {
            return Err(ConfigError::Invalid("runtime.cli must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = RepairConfig::parse("").unwrap();
        assert!(cfg.backup.enabled);
        assert_eq!(cfg.subsystem.default_version, 2);
        assert_eq!(cfg.services.manager, "LxssManager");
        assert_eq!(cfg.runtime.expected_os_type, "linux");
        assert_eq!(cfg.features.names.len(), 2);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = RepairConfig::parse(
            r#"
            [backup]
            enabled = false

            [timeouts]
            step_secs = 30
            "#,
        )
        .unwrap();
        assert!(!cfg.backup.enabled);
        assert_eq!(cfg.backup.helper_image, "alpine:3.20");
        assert_eq!(cfg.timeouts.step(), Duration::from_secs(30));
        assert_eq!(cfg.timeouts.command_secs, 300);
        assert_eq!(cfg.timeouts.archive(), Duration::from_secs(2 * 60 * 60));
    }

    #[test]
    fn rejects_unknown_default_version() {
        let err = RepairConfig::parse("[subsystem]\ndefault_version = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let err = RepairConfig::parse("[timeouts]\ncommand_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = RepairConfig::parse("[timeouts]\narchive_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RepairConfig::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
