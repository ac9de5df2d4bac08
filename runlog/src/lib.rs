//! Append-only run log.
//!
//! The log file is created once per run with a header naming the user and
//! start time. Every tracing event is appended through [`RunLogMakeWriter`]
//! and flushed immediately, so the file is complete up to the last event
//! even if the process dies.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log header to {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to the run's log file. Cheap to clone.
#[derive(Clone)]
pub struct RunLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl RunLog {
    /// Open `path` for appending and write the run header.
    pub fn create(
        path: &Path,
        user: &str,
        started_at: DateTime<Local>,
    ) -> Result<Self, RunLogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RunLogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| RunLogError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        writeln!(file, "{}", header(user, started_at))
            .and_then(|()| file.flush())
            .map_err(|source| RunLogError::Header {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writer factory for a `tracing-subscriber` fmt layer.
    pub fn make_writer(&self) -> RunLogMakeWriter {
        RunLogMakeWriter {
            file: Arc::clone(&self.file),
        }
    }
}

fn header(user: &str, started_at: DateTime<Local>) -> String {
    format!(
        "hostfix run started {} by {user}",
        started_at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[derive(Clone)]
pub struct RunLogMakeWriter {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for RunLogMakeWriter {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Appends to the log file, flushing after every write.
pub struct RunLogWriter {
    file: Arc<Mutex<File>>,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("run log mutex poisoned"))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("run log mutex poisoned"))?;
        file.flush()
    }
}

/// `HH:MM:SS` local-time prefix for fmt layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HhMmSs;

impl FormatTime for HhMmSs {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%H:%M:%S"))
    }
}
