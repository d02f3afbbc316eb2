//! Append-only failure log.
//!
//! One timestamped line per failure, write-only from the attendance core's
//! perspective. Its own I/O problems degrade to a warning so a broken log
//! file can never take the attendance loop down with it.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one failure record.
    pub fn append(&self, message: &str) {
        let line = format!("{}: {}\n", Local::now().format(TIMESTAMP_FORMAT), message);

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "could not append to error log");
        }
    }
}
