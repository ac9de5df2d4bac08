//! Pre-mutation backup of container-runtime state.
//!
//! Exports every container to `<name>_container_export.tar` and archives
//! every named volume to `<name>.tar.gz` through one short-lived helper
//! container. Backup is best-effort: it never returns an error, every
//! failure is recorded in the [`BackupManifest`] and summarised in the
//! returned [`StepOutcome`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::BackupConfig;
use crate::error::Result;
use crate::host::{HelperSpec, RuntimeCli, VolumeMount};
use crate::outcome::{StepKind, StepOutcome, StepStatus};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

const STEP_NAME: &str = "backup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerBackupStatus {
    Exported,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBackupStatus {
    Archived,
    Failed,
    /// The volume's mount point could not be resolved inside the helper.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerEntry {
    pub name: String,
    pub archive_path: PathBuf,
    pub status: ContainerBackupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeEntry {
    pub name: String,
    pub archive_path: PathBuf,
    pub status: VolumeBackupStatus,
    /// Diagnostic for `Skipped`, error text for `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Append-only record of what the backup attempted.
#[derive(Debug, Clone, Serialize)]
pub struct BackupManifest {
    target_dir: PathBuf,
    created_at: DateTime<Local>,
    containers: Vec<ContainerEntry>,
    volumes: Vec<VolumeEntry>,
    /// Set when the volume list could not be read; no volume was archived.
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_listing_error: Option<String>,
}

impl BackupManifest {
    fn new(target_dir: &Path) -> Self {
        Self {
            target_dir: target_dir.to_path_buf(),
            created_at: Local::now(),
            containers: Vec::new(),
            volumes: Vec::new(),
            volume_listing_error: None,
        }
    }

    fn push_container(&mut self, entry: ContainerEntry) {
        self.containers.push(entry);
    }

    fn push_volume(&mut self, entry: VolumeEntry) {
        self.volumes.push(entry);
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn containers(&self) -> &[ContainerEntry] {
        &self.containers
    }

    pub fn volumes(&self) -> &[VolumeEntry] {
        &self.volumes
    }

    pub fn volume_listing_error(&self) -> Option<&str> {
        self.volume_listing_error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.volumes.is_empty()
    }

    pub fn exported_count(&self) -> usize {
        self.containers
            .iter()
            .filter(|c| c.status == ContainerBackupStatus::Exported)
            .count()
    }

    pub fn archived_count(&self) -> usize {
        self.volumes_with(VolumeBackupStatus::Archived)
    }

    pub fn skipped_count(&self) -> usize {
        self.volumes_with(VolumeBackupStatus::Skipped)
    }

    /// Failed containers plus failed volumes.
    pub fn failed_count(&self) -> usize {
        self.containers.len() - self.exported_count()
            + self.volumes_with(VolumeBackupStatus::Failed)
    }

    fn volumes_with(&self, status: VolumeBackupStatus) -> usize {
        self.volumes.iter().filter(|v| v.status == status).count()
    }

    /// Persist as pretty JSON next to the archives.
    pub fn write_json(&self) -> std::io::Result<PathBuf> {
        let path = self.target_dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Manifest plus the step outcome summarising it.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub manifest: BackupManifest,
    pub outcome: StepOutcome,
}

/// Archive file name for an exported container.
pub fn container_archive_name(container: &str) -> String {
    format!("{container}_container_export.tar")
}

/// Archive file name for a volume.
pub fn volume_archive_name(volume: &str) -> String {
    format!("{volume}.tar.gz")
}

pub struct BackupSubsystem {
    runtime: Arc<dyn RuntimeCli>,
    config: BackupConfig,
}

impl BackupSubsystem {
    pub fn new(runtime: Arc<dyn RuntimeCli>, config: BackupConfig) -> Self {
        Self { runtime, config }
    }

    /// Back up all containers and volumes into `target_dir`.
    pub async fn backup(&self, target_dir: &Path) -> BackupReport {
        let mut manifest = BackupManifest::new(target_dir);

        if let Err(e) = tokio::fs::create_dir_all(target_dir).await {
            let outcome = StepOutcome::failed(
                StepKind::Backup,
                STEP_NAME,
                format!(
                    "cannot create backup directory {}: {e}",
                    target_dir.display()
                ),
            );
            return BackupReport { manifest, outcome };
        }

        // Snapshot of the runtime's containers; a failure here means the
        // runtime is unreachable and nothing else can be backed up.
        let containers = match self.runtime.list_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                let outcome = StepOutcome::failed(
                    StepKind::Backup,
                    STEP_NAME,
                    format!("container runtime unreachable, nothing backed up: {e}"),
                );
                return BackupReport { manifest, outcome };
            }
        };

        let mut details = Vec::new();

        if containers.is_empty() {
            tracing::info!("no containers found");
            details.push("no containers found".to_string());
        } else {
            tracing::info!(count = containers.len(), "exporting containers");
        }
        for name in &containers {
            let entry = self.export_container(name, target_dir).await;
            details.push(describe_container(&entry));
            manifest.push_container(entry);
        }

        match self.runtime.list_volumes().await {
            Ok(volumes) if volumes.is_empty() => {
                tracing::info!("no volumes found");
                details.push("no volumes found".to_string());
            }
            Ok(volumes) => {
                tracing::info!(count = volumes.len(), "archiving volumes");
                for entry in self.archive_volumes(&volumes, target_dir).await {
                    details.push(describe_volume(&entry));
                    manifest.push_volume(entry);
                }
            }
            Err(e) => {
                tracing::warn!("could not list volumes: {e}");
                details.push(format!("could not list volumes: {e}"));
                manifest.volume_listing_error = Some(e.to_string());
            }
        }

        match manifest.write_json() {
            Ok(path) => details.push(format!("manifest written to {}", path.display())),
            Err(e) => {
                tracing::warn!("could not write backup manifest: {e}");
                details.push(format!("could not write manifest: {e}"));
            }
        }

        let outcome = summarize(&manifest, details);
        BackupReport { manifest, outcome }
    }

    async fn export_container(&self, name: &str, target_dir: &Path) -> ContainerEntry {
        let archive_path = target_dir.join(container_archive_name(name));
        match self.runtime.export_container(name, &archive_path).await {
            Ok(()) => {
                tracing::info!(container = name, "exported");
                ContainerEntry {
                    name: name.to_string(),
                    archive_path,
                    status: ContainerBackupStatus::Exported,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(container = name, "export failed: {e}");
                discard_partial(&archive_path).await;
                ContainerEntry {
                    name: name.to_string(),
                    archive_path,
                    status: ContainerBackupStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn archive_volumes(&self, volumes: &[String], target_dir: &Path) -> Vec<VolumeEntry> {
        let mount_root = self.config.volume_mount_root.trim_end_matches('/');
        let archive_mount = self.config.archive_mount.trim_end_matches('/');
        let spec = HelperSpec {
            name: helper_name(),
            image: self.config.helper_image.clone(),
            volumes: volumes
                .iter()
                .map(|volume| VolumeMount {
                    volume: volume.clone(),
                    target: format!("{mount_root}/{volume}"),
                })
                .collect(),
            archive_dir: target_dir.to_path_buf(),
            archive_mount: archive_mount.to_string(),
        };

        let guard = HelperGuard::new(Arc::clone(&self.runtime), spec.name.clone());

        if let Err(e) = self.runtime.start_helper(&spec).await {
            tracing::warn!(helper = %spec.name, "backup helper failed to start: {e}");
            // A failed `docker run` can still leave a created container.
            if let Err(cleanup) = self.runtime.remove_helper(&spec.name).await {
                tracing::debug!(helper = %spec.name, "no helper to remove: {cleanup}");
            }
            guard.disarm();
            return volumes
                .iter()
                .map(|volume| VolumeEntry {
                    name: volume.clone(),
                    archive_path: target_dir.join(volume_archive_name(volume)),
                    status: VolumeBackupStatus::Failed,
                    reason: Some(format!("backup helper failed to start: {e}")),
                })
                .collect();
        }

        let mut entries = Vec::with_capacity(volumes.len());
        for mount in &spec.volumes {
            let entry = self
                .archive_volume(&spec.name, mount, archive_mount, target_dir)
                .await;
            entries.push(entry);
        }

        if let Err(e) = guard.release().await {
            tracing::warn!(helper = %spec.name, "backup helper removal failed: {e}");
        }

        entries
    }

    async fn archive_volume(
        &self,
        helper: &str,
        mount: &VolumeMount,
        archive_mount: &str,
        target_dir: &Path,
    ) -> VolumeEntry {
        let file_name = volume_archive_name(&mount.volume);
        let archive_path = target_dir.join(&file_name);
        let entry = |status, reason| VolumeEntry {
            name: mount.volume.clone(),
            archive_path: archive_path.clone(),
            status,
            reason,
        };

        match self.runtime.helper_dir_exists(helper, &mount.target).await {
            Ok(true) => {}
            Ok(false) => {
                let reason = format!("mount point {} not found in backup helper", mount.target);
                tracing::warn!(volume = %mount.volume, "skipped: {reason}");
                return entry(VolumeBackupStatus::Skipped, Some(reason));
            }
            Err(e) => {
                tracing::warn!(volume = %mount.volume, "mount probe failed: {e}");
                return entry(VolumeBackupStatus::Failed, Some(e.to_string()));
            }
        }

        let archive = format!("{archive_mount}/{file_name}");
        match self
            .runtime
            .helper_archive(helper, &mount.target, &archive)
            .await
        {
            Ok(()) => {
                tracing::info!(volume = %mount.volume, "archived");
                entry(VolumeBackupStatus::Archived, None)
            }
            Err(e) => {
                tracing::warn!(volume = %mount.volume, "archive failed: {e}");
                discard_partial(&archive_path).await;
                entry(VolumeBackupStatus::Failed, Some(e.to_string()))
            }
        }
    }
}

/// Removes the helper container when dropped unless it was already
/// released, so an abandoned backup future never leaves volume mounts open.
struct HelperGuard {
    runtime: Arc<dyn RuntimeCli>,
    name: String,
    armed: bool,
}

impl HelperGuard {
    fn new(runtime: Arc<dyn RuntimeCli>, name: String) -> Self {
        Self {
            runtime,
            name,
            armed: true,
        }
    }

    /// Give up ownership without removing anything.
    fn disarm(mut self) {
        self.armed = false;
    }

    /// Remove the helper. On failure the guard stays armed and the drop
    /// path makes a final synchronous attempt.
    async fn release(mut self) -> Result<()> {
        let result = self.runtime.remove_helper(&self.name).await;
        if result.is_ok() {
            self.armed = false;
        }
        result
    }
}

impl Drop for HelperGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!(helper = %self.name, "removing backup helper");
            self.runtime.remove_helper_blocking(&self.name);
        }
    }
}

/// Remove an archive left behind by a failed export.
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("removed partial archive {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove partial archive {}: {e}", path.display()),
    }
}

fn helper_name() -> String {
    format!(
        "hostfix-backup-{}-{}",
        std::process::id(),
        Local::now().format("%H%M%S%3f")
    )
}

fn describe_container(entry: &ContainerEntry) -> String {
    match (&entry.status, &entry.error) {
        (ContainerBackupStatus::Exported, _) => format!(
            "container {} exported to {}",
            entry.name,
            entry.archive_path.display()
        ),
        (ContainerBackupStatus::Failed, error) => format!(
            "container {} export failed: {}",
            entry.name,
            error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn describe_volume(entry: &VolumeEntry) -> String {
    let reason = entry.reason.as_deref().unwrap_or("unknown error");
    match entry.status {
        VolumeBackupStatus::Archived => format!(
            "volume {} archived to {}",
            entry.name,
            entry.archive_path.display()
        ),
        VolumeBackupStatus::Skipped => format!("volume {} skipped: {reason}", entry.name),
        VolumeBackupStatus::Failed => format!("volume {} failed: {reason}", entry.name),
    }
}

fn summarize(manifest: &BackupManifest, details: Vec<String>) -> StepOutcome {
    let incomplete = manifest.failed_count() + manifest.skipped_count() > 0;
    let status = if incomplete || manifest.volume_listing_error().is_some() {
        StepStatus::Warning
    } else {
        StepStatus::Ok
    };

    let mut message = format!(
        "{}/{} containers exported, {}/{} volumes archived",
        manifest.exported_count(),
        manifest.containers().len(),
        manifest.archived_count(),
        manifest.volumes().len(),
    );
    if manifest.skipped_count() > 0 {
        message.push_str(&format!(", {} skipped", manifest.skipped_count()));
    }
    if manifest.failed_count() > 0 {
        message.push_str(&format!(", {} failed", manifest.failed_count()));
    }
    message.push_str(&format!(" in {}", manifest.target_dir().display()));
    if manifest.volume_listing_error().is_some() {
        message.push_str("; volume listing failed");
    }

    StepOutcome::new(StepKind::Backup, STEP_NAME, status, message).with_details(details)
}
