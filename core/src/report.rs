//! Human-readable rendering of a finished run.

use crate::outcome::{RunSummary, StepStatus};

pub const REBOOT_RECOMMENDED: &str =
    "Restart recommended: features or the kernel changed and need a reboot to take effect.";
pub const NO_REBOOT_NEEDED: &str = "No restart required.";

/// Final recommendation line, printed whatever the step results were.
pub fn reboot_recommendation(summary: &RunSummary) -> &'static str {
    if summary.reboot_required() {
        REBOOT_RECOMMENDED
    } else {
        NO_REBOOT_NEEDED
    }
}

/// Plain-text table of every outcome followed by totals and the
/// recommendation.
pub fn render_summary(summary: &RunSummary) -> String {
    let width = summary
        .outcomes()
        .iter()
        .map(|o| o.name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::from("Run summary\n");
    for outcome in summary.outcomes() {
        out.push_str(&format!(
            "  {:<6} {:<width$}  {}\n",
            outcome.status().marker(),
            outcome.name(),
            outcome.message(),
        ));
    }
    out.push_str(&format!(
        "Totals: {} ok, {} warnings, {} failed\n",
        summary.count(StepStatus::Ok),
        summary.count(StepStatus::Warning),
        summary.count(StepStatus::Failed),
    ));
    out.push_str(reboot_recommendation(summary));
    out
}
