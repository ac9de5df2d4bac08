use crate::host::FeatureManager;
use crate::outcome::{StepKind, StepOutcome, StepStatus};

const STEP_NAME: &str = "features";

/// Make sure every feature in `names` is enabled.
///
/// Each feature is visited exactly once; a failure to enable one is a
/// warning and never stops the rest. `changed` is set when at least one
/// feature was switched on in this run.
pub async fn ensure_features(features: &dyn FeatureManager, names: &[String]) -> StepOutcome {
    if names.is_empty() {
        return StepOutcome::ok(StepKind::Features, STEP_NAME, "no features configured");
    }

    let mut status = StepStatus::Ok;
    let mut enabled = Vec::new();
    let mut problems = 0usize;
    let mut details = Vec::with_capacity(names.len());

    for name in names {
        let segment = match features.feature_state(name).await {
            Ok(state) if state.is_enabled() => {
                tracing::debug!(feature = %name, ?state, "already enabled");
                (StepStatus::Ok, format!("{name}: already enabled"))
            }
            Ok(state) => {
                tracing::info!(feature = %name, ?state, "enabling");
                match features.enable_feature(name).await {
                    Ok(()) => {
                        enabled.push(name.as_str());
                        (StepStatus::Ok, format!("{name}: enabled"))
                    }
                    Err(e) => (StepStatus::Warning, format!("{name}: enable failed: {e}")),
                }
            }
            Err(e) => (StepStatus::Warning, format!("{name}: state query failed: {e}")),
        };

        if segment.0 != StepStatus::Ok {
            problems += 1;
        }
        status = status.worst(segment.0);
        details.push(format!("{} {}", segment.0.marker(), segment.1));
    }

    let message = match (enabled.is_empty(), problems) {
        (true, 0) => format!("all {} features already enabled", names.len()),
        (false, 0) => format!("enabled {}; restart required", enabled.join(", ")),
        (true, n) => format!("{n} of {} features could not be enabled", names.len()),
        (false, n) => format!(
            "enabled {}; {n} of {} features could not be enabled; restart required",
            enabled.join(", "),
            names.len()
        ),
    };

    StepOutcome::new(StepKind::Features, STEP_NAME, status, message)
        .with_changed(!enabled.is_empty())
        .with_details(details)
}
