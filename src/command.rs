//! External command execution with a wall-clock limit
//!
//! The browser fetcher, the renderer and the merger are all external
//! programs. They share this runner so that every child process is bounded
//! by a timeout and killed when the timeout expires.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Longest stderr excerpt kept in error records
const STDERR_TAIL: usize = 2000;

/// Ways an external command can fail
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .limit.as_secs())]
    Timeout { program: String, limit: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args` and waits for it for at most `limit`
///
/// The child is spawned with `kill_on_drop`, so abandoning the wait on
/// timeout also kills the process.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    working_dir: Option<&Path>,
    limit: Duration,
) -> Result<CommandOutput, CommandError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    tracing::trace!("Running {} {:?}", program, args);

    let child = command.spawn().map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(CommandError::Timeout {
                program: program.to_string(),
                limit,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(CommandError::ExitStatus {
            program: program.to_string(),
            status: output.status,
            stderr: tail(&stderr, STDERR_TAIL).to_string(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Returns true if `path` exists and holds at least one byte
pub async fn is_non_empty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Last `max` bytes of `text`, cut on a char boundary and trimmed
fn tail(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_short_text() {
        assert_eq!(tail("  boom \n", 100), "boom");
    }

    #[test]
    fn test_tail_cuts_long_text() {
        let text = "a".repeat(50) + "end";
        assert_eq!(tail(&text, 3), "end");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let result = run_with_timeout(
            "sitebook-definitely-not-a-program",
            &[],
            None,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        let result = run_with_timeout("sh", &args, None, Duration::from_secs(5)).await;
        match result {
            Err(CommandError::ExitStatus { stderr, status, .. }) => {
                assert_eq!(stderr, "broken");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let args = vec!["5".to_string()];
        let result = run_with_timeout("sleep", &args, None, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_is_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        let full = dir.path().join("full.pdf");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"%PDF").unwrap();

        assert!(!is_non_empty_file(&empty).await);
        assert!(is_non_empty_file(&full).await);
        assert!(!is_non_empty_file(&dir.path().join("missing")).await);
    }
}
