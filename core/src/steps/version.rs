use crate::host::SubsystemCli;
use crate::outcome::{StepKind, StepOutcome};

const STEP_NAME: &str = "default version";

/// Set the subsystem's default version.
///
/// Never fails the run: the "feature not installed" answer is expected
/// while a restart is pending, and any other refusal is handed to the
/// operator with the CLI's own output.
pub async fn ensure_default_version(
    cli: &dyn SubsystemCli,
    version: u8,
    feature_missing_marker: &str,
) -> StepOutcome {
    let output = match cli.set_default_version(version).await {
        Ok(output) => output,
        Err(e) => {
            return StepOutcome::warning(
                StepKind::DefaultVersion,
                STEP_NAME,
                format!("could not set default version {version}: {e}"),
            );
        }
    };

    if output.success() {
        return StepOutcome::ok(
            StepKind::DefaultVersion,
            STEP_NAME,
            format!("default version set to {version}"),
        );
    }

    let raw = output.combined();
    if contains_ignore_case(&raw, feature_missing_marker) {
        return StepOutcome::warning(
            StepKind::DefaultVersion,
            STEP_NAME,
            format!("default version {version} needs a restart before it can be set"),
        )
        .with_details(vec![raw]);
    }

    StepOutcome::warning(
        StepKind::DefaultVersion,
        STEP_NAME,
        format!(
            "setting default version {version} exited with code {}",
            output.code_or_signal()
        ),
    )
    .with_details(vec![raw])
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}
