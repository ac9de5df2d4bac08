//! Scripted command runner for collaborator unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{HostError, Result};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Answers commands from a table keyed by [`CommandSpec::display`] and
/// records every invocation. Unscripted commands behave like a missing
/// program.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, command: &str, code: i32, stdout: &str) -> Self {
        self.respond_full(command, code, stdout, "")
    }

    pub(crate) fn respond_full(self, command: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(
                command.to_string(),
                CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
        }
        self
    }

    pub(crate) fn specs(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(CommandSpec::display).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&spec.display()).cloned())
            .ok_or_else(|| HostError::ProgramNotFound {
                program: spec.program.clone(),
            })
    }
}
