//! Optional feature management through `dism.exe`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{FeatureManager, FeatureState};
use crate::error::{HostError, Result};
use crate::exec::{CommandRunner, CommandSpec};

const DISM: &str = "dism.exe";

/// `ERROR_SUCCESS_REBOOT_REQUIRED`
const EXIT_REBOOT_REQUIRED: i32 = 3010;

pub struct DismFeatureManager {
    runner: Arc<dyn CommandRunner>,
}

impl DismFeatureManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn base() -> CommandSpec {
        // /english keeps the "State : ..." line parseable on localized hosts
        CommandSpec::new(DISM).args(["/online", "/english"])
    }
}

#[async_trait]
impl FeatureManager for DismFeatureManager {
    async fn feature_state(&self, name: &str) -> Result<FeatureState> {
        let spec = Self::base()
            .arg("/get-featureinfo")
            .arg(format!("/featurename:{name}"));
        let output = self.runner.run(&spec).await?.into_success(DISM)?;
        parse_feature_state(&output.stdout)
            .ok_or_else(|| HostError::parse(format!("state of feature {name}"), output.stdout))
    }

    async fn enable_feature(&self, name: &str) -> Result<()> {
        let spec = Self::base()
            .arg("/enable-feature")
            .arg(format!("/featurename:{name}"))
            .args(["/all", "/norestart"]);
        let output = self.runner.run(&spec).await?;
        match output.code {
            Some(0) | Some(EXIT_REBOOT_REQUIRED) => Ok(()),
            _ => Err(HostError::CommandFailed {
                program: DISM.to_string(),
                code: output.code_or_signal(),
                output: output.combined(),
            }),
        }
    }
}

fn parse_feature_state(stdout: &str) -> Option<FeatureState> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("state") {
            return None;
        }
        let state = match value.trim() {
            "Enabled" => FeatureState::Enabled,
            "Enable Pending" | "EnablePending" => FeatureState::EnablePending,
            "Disabled" => FeatureState::Disabled,
            other => FeatureState::Other(other.to_string()),
        };
        Some(state)
    })
}
