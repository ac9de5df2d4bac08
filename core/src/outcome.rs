//! Step outcome vocabulary shared by every repair stage.
//!
//! A [`StepOutcome`] is produced once by one step invocation and never
//! changes afterwards. The orchestrator appends outcomes to a
//! [`RunSummary`], which folds the `changed` flags of reboot-source steps
//! into a single reboot recommendation.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Tri-state result of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Warning,
    Failed,
}

impl StepStatus {
    /// Stable severity marker written to the console and the log file.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warning => "[WARN]",
            Self::Failed => "[FAIL]",
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Which stage of the run produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Backup,
    Features,
    Kernel,
    Service,
    StartupMode,
    DefaultVersion,
    Status,
}

impl StepKind {
    /// Only feature enablement and kernel installation need a restart to
    /// take effect.
    pub fn is_reboot_source(self) -> bool {
        matches!(self, Self::Features | Self::Kernel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Features => "features",
            Self::Kernel => "kernel",
            Self::Service => "service",
            Self::StartupMode => "startup_mode",
            Self::DefaultVersion => "default_version",
            Self::Status => "status",
        }
    }
}

/// Result of one step invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    kind: StepKind,
    name: String,
    status: StepStatus,
    message: String,
    changed: bool,
    details: Vec<String>,
}

impl StepOutcome {
    pub fn new(
        kind: StepKind,
        name: impl Into<String>,
        status: StepStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            status,
            message: message.into(),
            changed: false,
            details: Vec::new(),
        }
    }

    pub fn ok(kind: StepKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, name, StepStatus::Ok, message)
    }

    pub fn warning(kind: StepKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, name, StepStatus::Warning, message)
    }

    pub fn failed(kind: StepKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, name, StepStatus::Failed, message)
    }

    /// Mark whether the step changed host state.
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Attach per-entity detail lines.
    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Single-line rendering used by the log sink.
    pub fn log_line(&self) -> String {
        format!("{} {}: {}", self.status.marker(), self.name, self.message)
    }

    /// Emit this outcome through `tracing` at the level matching its status.
    pub fn emit(&self) {
        let line = self.log_line();
        match self.status {
            StepStatus::Ok => tracing::info!(step = self.kind.as_str(), "{line}"),
            StepStatus::Warning => tracing::warn!(step = self.kind.as_str(), "{line}"),
            StepStatus::Failed => tracing::error!(step = self.kind.as_str(), "{line}"),
        }
        for detail in &self.details {
            tracing::info!(step = self.kind.as_str(), "    {detail}");
        }
    }
}

/// Ordered record of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
    outcomes: Vec<StepOutcome>,
    reboot_required: bool,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            outcomes: Vec::new(),
            reboot_required: false,
        }
    }

    /// Append an outcome and fold its `changed` flag into the reboot
    /// decision. Ignored once the summary is finished.
    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        if self.finished_at.is_some() {
            tracing::warn!(
                step = outcome.name(),
                "outcome recorded after run finished; ignoring"
            );
            return;
        }
        self.reboot_required |= outcome.kind().is_reboot_source() && outcome.changed();
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Local::now());
        }
    }

    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub fn reboot_required(&self) -> bool {
        self.reboot_required
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Number of outcomes with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == status)
            .count()
    }

    /// Worst status across the run; `Ok` for an empty run.
    pub fn overall(&self) -> StepStatus {
        self.outcomes
            .iter()
            .map(StepOutcome::status)
            .fold(StepStatus::Ok, StepStatus::worst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn worst_prefers_failed_over_warning() {
        assert_eq!(StepStatus::Ok.worst(StepStatus::Warning), StepStatus::Warning);
        assert_eq!(
            StepStatus::Failed.worst(StepStatus::Warning),
            StepStatus::Failed
        );
        assert_eq!(StepStatus::Ok.worst(StepStatus::Ok), StepStatus::Ok);
    }

    #[test]
    fn service_change_does_not_require_reboot() {
        let mut summary = RunSummary::new();
        summary.record(
            StepOutcome::ok(StepKind::Service, "com.docker.service", "started").with_changed(true),
        );
        assert!(!summary.reboot_required());
    }

    #[test]
    fn kernel_change_requires_reboot() {
        let mut summary = RunSummary::new();
        summary.record(StepOutcome::ok(StepKind::Features, "features", "already enabled"));
        summary.record(StepOutcome::ok(StepKind::Kernel, "kernel", "installed").with_changed(true));
        assert!(summary.reboot_required());
    }

    #[test]
    fn finished_summary_rejects_new_outcomes() {
        let mut summary = RunSummary::new();
        summary.finish();
        summary.record(StepOutcome::ok(StepKind::Kernel, "kernel", "installed").with_changed(true));
        assert!(summary.outcomes().is_empty());
        assert!(!summary.reboot_required());
    }

    #[test]
    fn log_line_carries_marker_and_values() {
        let outcome = StepOutcome::failed(StepKind::Service, "LxssManager", "service not found");
        assert_eq!(outcome.log_line(), "[FAIL] LxssManager: service not found");
    }
}
