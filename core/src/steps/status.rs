use crate::host::{RuntimeCli, SubsystemCli};
use crate::outcome::{StepKind, StepOutcome, StepStatus};

const STEP_NAME: &str = "status";

/// Read-only report of the subsystem and runtime after repair.
///
/// Only ever `Ok` or `Warning`: a missing runtime is not the subsystem's
/// problem, and this step changes nothing.
pub async fn final_status(
    subsystem: &dyn SubsystemCli,
    runtime: &dyn RuntimeCli,
    expected_os_type: &str,
) -> StepOutcome {
    let mut status = StepStatus::Ok;
    let mut notes = Vec::new();
    let mut details = Vec::new();

    match subsystem.status().await {
        Ok(text) => details.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| format!("subsystem: {line}")),
        ),
        Err(e) => {
            status = StepStatus::Warning;
            notes.push(format!("subsystem status unavailable ({e})"));
        }
    }

    match runtime.server_version().await {
        Ok(version) => details.push(format!("runtime version: {version}")),
        Err(e) if e.is_unreachable() => {
            status = StepStatus::Warning;
            notes.push("container runtime CLI not installed".to_string());
        }
        Err(e) => {
            status = StepStatus::Warning;
            notes.push(format!("container runtime not responding ({e})"));
        }
    }

    match runtime.os_type().await {
        Ok(os_type) if os_type.eq_ignore_ascii_case(expected_os_type) => {
            details.push(format!("runtime engine type: {os_type}"));
        }
        Ok(os_type) => {
            status = StepStatus::Warning;
            details.push(format!("runtime engine type: {os_type}"));
            notes.push(format!(
                "runtime reports engine type {os_type}, expected {expected_os_type}"
            ));
        }
        Err(e) if e.is_unreachable() => {}
        Err(e) => {
            status = StepStatus::Warning;
            notes.push(format!("runtime engine type unavailable ({e})"));
        }
    }

    let message = if notes.is_empty() {
        "subsystem and container runtime look healthy".to_string()
    } else {
        notes.join("; ")
    };

    StepOutcome::new(StepKind::Status, STEP_NAME, status, message).with_details(details)
}
