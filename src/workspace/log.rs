//! Append-only run files
//!
//! Operator logs and the queue/visited snapshots are plain text files that
//! are appended to and flushed on every write, so they reflect partial
//! progress if the run is interrupted.

use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The operator log files kept in the workspace `logs/` directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Page fetch failures
    Crawl,
    /// Render failures with per-strategy attempts
    Render,
    /// Browser collaborator failures
    Browser,
    /// Merge input order and merge collaborator output
    Merge,
}

impl LogKind {
    /// File name inside the `logs/` directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl_errors.log",
            Self::Render => "render_errors.log",
            Self::Browser => "browser_errors.log",
            Self::Merge => "merge.log",
        }
    }

    pub fn all() -> [LogKind; 4] {
        [Self::Crawl, Self::Render, Self::Browser, Self::Merge]
    }
}

/// An append-only text file shared between workers
#[derive(Debug)]
pub struct AppendFile {
    path: PathBuf,
    file: Mutex<File>,
    timestamped: bool,
}

impl AppendFile {
    /// Opens (creating if needed) a file for appending
    ///
    /// Timestamped files prefix each line with an RFC 3339 UTC timestamp.
    pub fn open(path: &Path, timestamped: bool) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            timestamped,
        })
    }

    /// Appends one line and flushes it
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;

        if self.timestamped {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            writeln!(file, "{} {}", now, line)?;
        } else {
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    /// Appends one line, logging instead of failing on IO errors
    ///
    /// Operator logs must never take a run down.
    pub fn record(&self, line: &str) {
        if let Err(e) = self.append(line) {
            tracing::warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The set of operator logs for one run
#[derive(Debug)]
pub struct RunLogs {
    crawl: AppendFile,
    render: AppendFile,
    browser: AppendFile,
    merge: AppendFile,
}

impl RunLogs {
    /// Opens every log file in `dir`
    pub fn open(dir: &Path) -> io::Result<Self> {
        let open = |kind: LogKind| AppendFile::open(&dir.join(kind.file_name()), true);
        Ok(Self {
            crawl: open(LogKind::Crawl)?,
            render: open(LogKind::Render)?,
            browser: open(LogKind::Browser)?,
            merge: open(LogKind::Merge)?,
        })
    }

    pub fn get(&self, kind: LogKind) -> &AppendFile {
        match kind {
            LogKind::Crawl => &self.crawl,
            LogKind::Render => &self.render,
            LogKind::Browser => &self.browser,
            LogKind::Merge => &self.merge,
        }
    }

    /// Appends a line to the given log
    pub fn record(&self, kind: LogKind, line: &str) {
        self.get(kind).record(line);
    }

    pub fn path(&self, kind: LogKind) -> &Path {
        self.get(kind).path()
    }
}
