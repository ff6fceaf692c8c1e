//! Injected action log capability
//!
//! Every significant step of a snapshot or restore (file added/extracted,
//! table dropped/loaded, error encountered) is appended as one timestamped
//! line to an [`ActionLog`]. The core never touches a fixed log path; it
//! only talks to this trait, so tests can inject [`MemoryLog`] and inspect
//! the lines afterwards. Presentation (live tailing, auto-scroll) is the
//! caller's concern.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only, line-oriented action log
pub trait ActionLog: Send + Sync {
    /// Append one line for a significant step
    fn append(&self, message: &str);

    /// Discard all previously appended lines
    fn clear(&self);
}

/// Action log backed by an append-only text file
///
/// Each line is prefixed with a local timestamp. Logging failures are
/// reported through `tracing` and never abort the running operation.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    /// Create a file log writing to `path`; the file is created on first
    /// append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActionLog for FileLog {
    fn append(&self, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{stamp}] {message}\n");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to append to action log");
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::write(&self.path, b"") {
            warn!(path = %self.path.display(), error = %e, "failed to clear action log");
        }
    }
}

/// In-memory action log for tests and embedding callers
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    /// Create an empty in-memory log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all appended lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl ActionLog for MemoryLog {
    fn append(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }

    fn clear(&self) {
        self.lines.lock().clear();
    }
}
