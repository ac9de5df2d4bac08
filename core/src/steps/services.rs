use crate::error::HostError;
use crate::host::{ServiceManager, ServiceState, StartupStore};
use crate::outcome::{StepKind, StepOutcome};

/// A set of services repaired together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGroup {
    pub label: String,
    pub names: Vec<String>,
    /// Service whose persisted startup mode is forced to automatic before
    /// it is checked.
    pub manager: Option<String>,
}

impl ServiceGroup {
    pub fn new(label: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            label: label.into(),
            names,
            manager: None,
        }
    }

    pub fn with_manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }
}

/// Make sure every service in `group` is running.
///
/// Produces one outcome per service, plus a `StartupMode` outcome right
/// before the group's manager service. A manager that is not one of the
/// group's services gets its `StartupMode` outcome first.
pub async fn ensure_services(
    services: &dyn ServiceManager,
    startup: &dyn StartupStore,
    group: &ServiceGroup,
) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(group.names.len() + 1);

    // A manager outside the group still gets its startup mode written.
    let outside = group
        .manager
        .as_deref()
        .filter(|manager| !group.names.iter().any(|name| name == manager));
    if let Some(manager) = outside {
        outcomes.push(force_automatic_start(startup, manager).await);
    }

    for name in &group.names {
        if group.manager.as_deref() == Some(name.as_str()) {
            outcomes.push(force_automatic_start(startup, name).await);
        }
        outcomes.push(ensure_running(services, name).await);
    }

    outcomes
}

/// Unconditionally persist the automatic startup mode.
async fn force_automatic_start(startup: &dyn StartupStore, name: &str) -> StepOutcome {
    let step = format!("{name} startup");
    match startup.set_automatic_start(name).await {
        Ok(()) => StepOutcome::ok(StepKind::StartupMode, step, "startup mode set to automatic"),
        Err(e) => StepOutcome::failed(
            StepKind::StartupMode,
            step,
            format!("could not set automatic startup: {e}"),
        ),
    }
}

async fn ensure_running(services: &dyn ServiceManager, name: &str) -> StepOutcome {
    let state = match services.service_state(name).await {
        Ok(state) => state,
        Err(HostError::ServiceMissing { .. }) => {
            return StepOutcome::failed(StepKind::Service, name, "service not found");
        }
        Err(e) => {
            return StepOutcome::failed(
                StepKind::Service,
                name,
                format!("could not query service: {e}"),
            );
        }
    };

    let previous = match state {
        ServiceState::Running => {
            return StepOutcome::ok(StepKind::Service, name, "already running");
        }
        ServiceState::NotRunning(previous) => previous,
    };

    tracing::info!(service = name, state = %previous, "starting service");
    match services.start_service(name).await {
        Ok(()) => StepOutcome::ok(
            StepKind::Service,
            name,
            format!("started (was {})", previous.to_lowercase()),
        )
        .with_changed(true),
        Err(HostError::ServiceMissing { .. }) => {
            StepOutcome::failed(StepKind::Service, name, "service not found")
        }
        Err(e) => StepOutcome::failed(StepKind::Service, name, format!("start failed: {e}")),
    }
}
