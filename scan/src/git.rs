//! Bounded git subprocess calls.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::FetchError;

/// Runs `git <args>` in `dir`, killing it after `timeout`.
///
/// Returns stdout on success.
pub(crate) fn run_git(
    dir: Option<&Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let label = format!("git {}", args.join(" "));
    debug!(command = %label, dir = ?dir, "running git");

    let mut command = Command::new("git");
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .map_err(|e| FetchError::io(format!("spawning {label}"), e))?;

    // Drain both pipes in background threads so a full pipe buffer cannot
    // block the child before it exits.
    let stdout_thread = child.stdout.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let result = pipe.read_to_end(&mut buf);
            (buf, result)
        })
    });
    let stderr_thread = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            debug!(command = %label, timeout_s = timeout.as_secs(), "git timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(FetchError::Timeout {
                command: label,
                timeout,
            });
        }
        Err(e) => return Err(FetchError::io(format!("waiting for {label}"), e)),
    };

    let (stdout, read_result) = stdout_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_else(|| (Vec::new(), Ok(0)));
    let stderr = stderr_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(FetchError::Command {
            command: label,
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    read_result.map_err(|e| FetchError::io(format!("reading output of {label}"), e))?;

    Ok(stdout)
}

/// Runs git and returns trimmed stdout as text.
pub(crate) fn run_git_text(
    dir: Option<&Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<String, FetchError> {
    let stdout = run_git(dir, args, timeout)?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

/// Returns `true` when git's stderr says a ref or object does not exist.
pub(crate) fn is_missing_ref(err: &FetchError) -> bool {
    match err {
        FetchError::Command { stderr, .. } => {
            let stderr = stderr.to_ascii_lowercase();
            stderr.contains("not a valid object name")
                || stderr.contains("invalid object name")
                || stderr.contains("unknown revision")
                || stderr.contains("not a tree object")
        }
        _ => false,
    }
}
