//! Fixed-order repair run.
//!
//! Backup always finishes before the first mutating step. Every step runs
//! regardless of earlier results, each bounded by the configured step
//! timeout, and the [`RunSummary`] folds their outcomes into one reboot
//! decision.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::backup::BackupSubsystem;
use crate::config::RepairConfig;
use crate::environment::HostEnvironment;
use crate::host::HostServices;
use crate::outcome::{RunSummary, StepKind, StepOutcome};
use crate::steps::{self, ServiceGroup};

pub struct Orchestrator {
    host: HostServices,
    config: RepairConfig,
    env: HostEnvironment,
    backup_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        host: HostServices,
        config: RepairConfig,
        env: HostEnvironment,
        backup_dir: PathBuf,
    ) -> Self {
        Self {
            host,
            config,
            env,
            backup_dir,
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Run every stage in order and return the finished summary.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::new();
        let step_limit = self.config.timeouts.step();

        tracing::info!("stage 1/7: backing up container runtime state");
        let backup = self.backup().await;
        record(&mut summary, backup);

        tracing::info!("stage 2/7: checking optional features");
        let outcome = bounded(
            StepKind::Features,
            "features",
            step_limit,
            steps::ensure_features(self.host.features.as_ref(), &self.config.features.names),
        )
        .await;
        record(&mut summary, outcome);

        tracing::info!("stage 3/7: checking kernel update");
        let kernel_path = self.env.system_path(&self.config.kernel.path);
        let download_path = self
            .env
            .temp_dir
            .join(&self.config.kernel.installer_file_name);
        let outcome = bounded(
            StepKind::Kernel,
            "kernel",
            step_limit,
            steps::ensure_kernel(
                self.host.kernel.as_ref(),
                &kernel_path,
                &self.config.kernel.url,
                &download_path,
            ),
        )
        .await;
        record(&mut summary, outcome);

        tracing::info!("stage 4/7: checking subsystem services");
        for outcome in self.services(self.subsystem_group(), step_limit).await {
            record(&mut summary, outcome);
        }

        tracing::info!("stage 5/7: checking container runtime services");
        let runtime_group = ServiceGroup::new("runtime", self.config.services.runtime.clone());
        for outcome in self.services(runtime_group, step_limit).await {
            record(&mut summary, outcome);
        }

        tracing::info!("stage 6/7: enforcing default subsystem version");
        let outcome = bounded(
            StepKind::DefaultVersion,
            "default version",
            step_limit,
            steps::ensure_default_version(
                self.host.subsystem.as_ref(),
                self.config.subsystem.default_version,
                &self.config.subsystem.feature_missing_marker,
            ),
        )
        .await;
        record(&mut summary, outcome);

        tracing::info!("stage 7/7: verifying final status");
        let outcome = bounded(
            StepKind::Status,
            "status",
            step_limit,
            steps::final_status(
                self.host.subsystem.as_ref(),
                self.host.runtime.as_ref(),
                &self.config.runtime.expected_os_type,
            ),
        )
        .await;
        record(&mut summary, outcome);

        summary.finish();
        summary
    }

    async fn backup(&self) -> StepOutcome {
        if !self.config.backup.enabled {
            return StepOutcome::warning(
                StepKind::Backup,
                "backup",
                "backup disabled; container data was not saved before repair",
            );
        }

        let limit = self.config.timeouts.backup();
        let subsystem =
            BackupSubsystem::new(self.host.runtime.clone(), self.config.backup.clone());
        match tokio::time::timeout(limit, subsystem.backup(&self.backup_dir)).await {
            Ok(report) => report.outcome,
            Err(_) => StepOutcome::failed(
                StepKind::Backup,
                "backup",
                format!(
                    "backup timed out after {}s; partial archives may remain in {}",
                    limit.as_secs(),
                    self.backup_dir.display()
                ),
            ),
        }
    }

    fn subsystem_group(&self) -> ServiceGroup {
        let services = &self.config.services;
        let group = ServiceGroup::new("subsystem", services.subsystem.clone());
        if services.manager.is_empty() {
            group
        } else {
            group.with_manager(services.manager.clone())
        }
    }

    async fn services(&self, group: ServiceGroup, limit: Duration) -> Vec<StepOutcome> {
        let work = steps::ensure_services(
            self.host.services.as_ref(),
            self.host.startup.as_ref(),
            &group,
        );
        match tokio::time::timeout(limit, work).await {
            Ok(outcomes) => outcomes,
            Err(_) => vec![StepOutcome::failed(
                StepKind::Service,
                format!("{} services", group.label),
                format!("timed out after {}s", limit.as_secs()),
            )],
        }
    }
}

fn record(summary: &mut RunSummary, outcome: StepOutcome) {
    outcome.emit();
    summary.record(outcome);
}

async fn bounded<F>(kind: StepKind, name: &str, limit: Duration, step: F) -> StepOutcome
where
    F: Future<Output = StepOutcome>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(outcome) => outcome,
        Err(_) => StepOutcome::failed(kind, name, format!("timed out after {}s", limit.as_secs())),
    }
}
