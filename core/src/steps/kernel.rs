use std::path::Path;

use crate::host::KernelInstaller;
use crate::outcome::{StepKind, StepOutcome};

const STEP_NAME: &str = "kernel";

/// Install the kernel update when `kernel_path` is absent.
///
/// One download attempt and one install attempt per run. Only a zero
/// installer exit code counts as success.
pub async fn ensure_kernel(
    installer: &dyn KernelInstaller,
    kernel_path: &Path,
    url: &str,
    download_path: &Path,
) -> StepOutcome {
    if kernel_path.exists() {
        return StepOutcome::ok(
            StepKind::Kernel,
            STEP_NAME,
            format!("kernel present at {}", kernel_path.display()),
        );
    }

    tracing::info!(path = %kernel_path.display(), url, "kernel missing, downloading update");

    if let Err(e) = installer.download(url, download_path).await {
        return StepOutcome::failed(
            StepKind::Kernel,
            STEP_NAME,
            format!("kernel update download failed: {e}"),
        );
    }

    match installer.install(download_path).await {
        Ok(0) => StepOutcome::ok(
            StepKind::Kernel,
            STEP_NAME,
            "kernel update installed; restart required",
        )
        .with_changed(true)
        .with_details(vec![format!("installer: {}", download_path.display())]),
        Ok(code) => StepOutcome::failed(
            StepKind::Kernel,
            STEP_NAME,
            format!(
                "kernel update installer {} exited with code {code}",
                download_path.display()
            ),
        ),
        Err(e) => StepOutcome::failed(
            StepKind::Kernel,
            STEP_NAME,
            format!("kernel update install failed: {e}"),
        ),
    }
}
