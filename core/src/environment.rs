//! Host environment inputs and the run's timestamped output locations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Directories and identity the run reads from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub user_profile: PathBuf,
    pub desktop: PathBuf,
    pub temp_dir: PathBuf,
    pub system_root: PathBuf,
    pub user_name: String,
}

impl HostEnvironment {
    /// Resolve from the process environment.
    ///
    /// Prefers the Windows variables (`USERPROFILE`, `SystemRoot`,
    /// `USERNAME`) and falls back to the platform directories reported by
    /// `dirs`.
    pub fn detect() -> Self {
        let user_profile = std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let desktop = dirs::desktop_dir().unwrap_or_else(|| user_profile.join("Desktop"));

        let system_root = std::env::var_os("SystemRoot")
            .or_else(|| std::env::var_os("windir"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));

        let user_name = std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            user_profile,
            desktop,
            temp_dir: std::env::temp_dir(),
            system_root,
            user_name,
        }
    }

    /// Resolve a path that may be relative to the system root.
    pub fn system_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.system_root.join(path)
        }
    }
}

/// Timestamped names for one run's log file and backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub log_file: PathBuf,
    pub backup_dir: PathBuf,
}

impl RunPaths {
    pub const LOG_PREFIX: &'static str = "hostfix";
    pub const BACKUP_PREFIX: &'static str = "docker_backup";

    /// Both outputs live on the desktop and share the run's start stamp.
    pub fn for_run(env: &HostEnvironment, started_at: DateTime<Local>) -> Self {
        let stamp = run_stamp(started_at);
        Self {
            log_file: env
                .desktop
                .join(format!("{}_{stamp}.log", Self::LOG_PREFIX)),
            backup_dir: env
                .desktop
                .join(format!("{}_{stamp}", Self::BACKUP_PREFIX)),
        }
    }
}

/// `YYYYmmdd_HHMMSS` in local time.
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}
