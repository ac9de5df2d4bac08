//! Errors raised by host collaborators.
//!
//! Steps never let these escape: each one is converted into a
//! [`StepOutcome`](crate::outcome::StepOutcome) at the step boundary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("program not found: {program}")]
    ProgramNotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", elapsed.as_secs())]
    TimedOut { program: String, elapsed: Duration },

    #[error("{program} exited with code {code}: {output}")]
    CommandFailed {
        program: String,
        code: i32,
        output: String,
    },

    #[error("service not found: {name}")]
    ServiceMissing { name: String },

    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {what} from output: {raw}")]
    Parse { what: String, raw: String },
}

impl HostError {
    pub fn io(
        context: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            raw: raw.into(),
        }
    }

    /// The collaborator binary is absent or could not be started at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::ProgramNotFound { .. } | Self::Spawn { .. })
    }
}
