//! Run-scoped scratch workspace
//!
//! This module handles everything a run writes to disk besides the final
//! output:
//! - The scratch directory with `pages/`, `rendered/` and `logs/`
//! - The operator logs (crawl, render, browser, merge)
//! - The queue and visited snapshots for web mode
//! - Exporting logs and snapshots for postmortem inspection
//!
//! The [`Workspace`] is a scoped resource: dropping it removes the scratch
//! directory unless the caller asked to keep it. Every exit path of a run
//! (success, fatal error, interruption) drops it.

mod log;

pub use log::{AppendFile, LogKind, RunLogs};

use crate::config::WorkspaceConfig;
use crate::SiteBookError;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Queue snapshot file name
pub const QUEUE_SNAPSHOT: &str = "queue.txt";

/// Visited snapshot file name
pub const VISITED_SNAPSHOT: &str = "visited.txt";

/// The scratch directory of one run
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    keep: bool,
    logs: Arc<RunLogs>,
}

impl Workspace {
    /// Creates a fresh workspace under `config.root` (or the system temp dir)
    ///
    /// # Layout
    ///
    /// ```text
    /// sitebook-<timestamp>-<pid>/
    ///   logs/      operator logs
    ///   pages/     saved HTML pages and their asset folders
    ///   rendered/  rendered documents
    /// ```
    pub fn create(config: &WorkspaceConfig) -> Result<Self, SiteBookError> {
        let parent = config.root.clone().unwrap_or_else(std::env::temp_dir);
        let name = format!(
            "sitebook-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            std::process::id()
        );
        Self::create_at(&parent.join(name), config.keep)
    }

    /// Creates a workspace at an exact path
    pub fn create_at(root: &Path, keep: bool) -> Result<Self, SiteBookError> {
        if root.exists() {
            return Err(SiteBookError::Workspace(format!(
                "{} already exists",
                root.display()
            )));
        }

        fs::create_dir_all(root.join("logs"))?;
        fs::create_dir_all(root.join("pages"))?;
        fs::create_dir_all(root.join("rendered"))?;
        // Collaborators run in other working directories
        let root = fs::canonicalize(root)?;

        let logs = Arc::new(RunLogs::open(&root.join("logs"))?);

        tracing::debug!("Created workspace at {}", root.display());

        Ok(Self {
            root,
            keep,
            logs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Directory holding saved HTML pages
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    /// Directory holding rendered documents
    pub fn rendered_dir(&self) -> PathBuf {
        self.root.join("rendered")
    }

    pub fn queue_snapshot(&self) -> PathBuf {
        self.root.join(QUEUE_SNAPSHOT)
    }

    pub fn visited_snapshot(&self) -> PathBuf {
        self.root.join(VISITED_SNAPSHOT)
    }

    pub fn logs(&self) -> &RunLogs {
        &self.logs
    }

    /// Shared handle to the operator logs, for workers
    pub fn logs_handle(&self) -> Arc<RunLogs> {
        Arc::clone(&self.logs)
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    /// Copies the logs and snapshots into `dest` for postmortem inspection
    ///
    /// Missing snapshots (local mode) are ignored.
    pub fn export_debug(&self, dest: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dest)?;
        let mut copied = Vec::new();

        for kind in LogKind::all() {
            let source = self.logs.path(kind);
            let target = dest.join(kind.file_name());
            fs::copy(source, &target)?;
            copied.push(target);
        }

        for snapshot in [self.queue_snapshot(), self.visited_snapshot()] {
            if let Some(name) = snapshot.file_name() {
                if snapshot.exists() {
                    let target = dest.join(name);
                    fs::copy(&snapshot, &target)?;
                    copied.push(target);
                }
            }
        }

        Ok(copied)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!("Keeping workspace at {}", self.root.display());
            return;
        }

        match fs::remove_dir_all(&self.root) {
            Ok(()) => tracing::debug!("Removed workspace {}", self.root.display()),
            Err(e) => tracing::warn!(
                "Failed to remove workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_layout() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("run");
        let workspace = Workspace::create_at(&root, false).unwrap();

        assert!(workspace.logs_dir().is_dir());
        assert!(workspace.pages_dir().is_dir());
        assert!(workspace.rendered_dir().is_dir());
        assert!(workspace.logs_dir().join("merge.log").exists());
    }

    #[test]
    fn test_drop_removes_workspace() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("run");
        {
            let _workspace = Workspace::create_at(&root, false).unwrap();
            assert!(root.exists());
        }
        assert!(!root.exists());
    }

    #[test]
    fn test_drop_keeps_workspace_when_asked() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("run");
        {
            let _workspace = Workspace::create_at(&root, true).unwrap();
        }
        assert!(root.exists());
    }

    #[test]
    fn test_create_refuses_existing_directory() {
        let parent = tempfile::tempdir().unwrap();
        let result = Workspace::create_at(parent.path(), false);
        assert!(matches!(result, Err(SiteBookError::Workspace(_))));
    }

    #[test]
    fn test_create_under_configured_root() {
        let parent = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig {
            root: Some(parent.path().to_path_buf()),
            ..Default::default()
        };
        let workspace = Workspace::create(&config).unwrap();
        let parent = fs::canonicalize(parent.path()).unwrap();
        assert!(workspace.root().starts_with(&parent));
        assert!(workspace.root().is_absolute());
    }

    #[test]
    fn test_export_debug_copies_logs_and_snapshots() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create_at(&parent.path().join("run"), false).unwrap();
        workspace.logs().record(LogKind::Crawl, "https://ex.com/a: HTTP 404");
        fs::write(workspace.queue_snapshot(), "https://ex.com\n").unwrap();

        let dest = parent.path().join("debug");
        let copied = workspace.export_debug(&dest).unwrap();

        assert_eq!(copied.len(), 5);
        assert!(dest.join("queue.txt").exists());
        assert!(!dest.join("visited.txt").exists());
        let crawl = fs::read_to_string(dest.join("crawl_errors.log")).unwrap();
        assert!(crawl.contains("HTTP 404"));
    }
}
