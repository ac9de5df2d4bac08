//! External command execution.
//!
//! Every collaborator shells out through a [`CommandRunner`], which takes an
//! explicit program + argument list. Nothing is routed through a shell, so
//! no command text is ever assembled at runtime.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{HostError, Result};

/// Program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Replaces the runner's default bound for this command only.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Bound this command by `limit` instead of the runner default.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable rendering for logs. Not meant to be re-parsed.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code with `-1` standing in for signal termination.
    pub fn code_or_signal(&self) -> i32 {
        self.code.unwrap_or(-1)
    }

    /// stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }

    /// Turn a non-zero exit into [`HostError::CommandFailed`].
    pub fn into_success(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HostError::CommandFailed {
                program: program.to_string(),
                code: self.code_or_signal(),
                output: self.combined(),
            })
        }
    }
}

/// Executes external commands on behalf of host collaborators.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes, bounded by a timeout.
///
/// The child is killed when the timeout elapses or when the returned future
/// is dropped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let program = which::which(&spec.program).map_err(|_| HostError::ProgramNotFound {
            program: spec.program.clone(),
        })?;

        tracing::debug!(command = %spec.display(), "running");

        let child = Command::new(&program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    HostError::ProgramNotFound {
                        program: spec.program.clone(),
                    }
                } else {
                    HostError::Spawn {
                        program: spec.program.clone(),
                        source,
                    }
                }
            })?;

        let limit = spec.timeout.unwrap_or(self.timeout);
        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| HostError::TimedOut {
                program: spec.program.clone(),
                elapsed: limit,
            })?
            .map_err(|source| HostError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: decode_output(&output.stdout),
            stderr: decode_output(&output.stderr),
        };

        tracing::debug!(
            command = %spec.display(),
            code = result.code_or_signal(),
            "finished"
        );

        Ok(result)
    }
}

/// Decode console output that may be UTF-16LE.
///
/// Some Windows tools (notably `wsl.exe`) write UTF-16LE to redirected
/// pipes. Such output is recognised by a BOM or by NUL high bytes in the
/// leading code units; everything else is decoded as lossy UTF-8.
pub fn decode_output(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xFF, 0xFE]);
    let looks_utf16 = body.is_some()
        || (bytes.len() >= 4
            && bytes.len() % 2 == 0
            && bytes
                .chunks_exact(2)
                .take(8)
                .all(|pair| pair[1] == 0 && pair[0] != 0));

    if looks_utf16 {
        let body = body.unwrap_or(bytes);
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8_lossy(bytes).into_owned()
}
