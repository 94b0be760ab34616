// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External process runner.
//
// Every invocation of Ghostscript, qpdf or ocrmypdf goes through here so that
// each one is bounded by a timeout and killed if the future is dropped.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use kompakt_core::error::{KompaktError, Result};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Timeout for `--version` probes.
const VERSION_PROBE_SECS: u64 = 10;

/// Captured result of a finished tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last non-empty stderr line, for short error messages.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(str::trim)
            .unwrap_or("")
    }

    /// Human-readable failure description.
    pub fn describe_failure(&self) -> String {
        let tail = self.stderr_tail();
        if tail.is_empty() {
            format!("exited with {}", self.status)
        } else {
            format!("exited with {}: {}", self.status, tail)
        }
    }
}

/// Run `program` with `args`, bounded by `timeout`.
///
/// A non-zero exit is *not* an error here; callers decide what it means.
/// Spawn failures map to [`KompaktError::ToolUnavailable`] and an elapsed
/// timeout to [`KompaktError::Timeout`]. The child is killed on timeout.
#[instrument(skip(args), fields(program = %program.display()))]
pub async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|err| {
        KompaktError::ToolUnavailable(format!("{}: {}", program.display(), err))
    })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            warn!(tool = %tool, seconds = timeout.as_secs(), "tool timed out");
            KompaktError::Timeout {
                tool: tool.clone(),
                seconds: timeout.as_secs(),
            }
        })??;

    debug!(tool = %tool, status = %output.status, "tool finished");

    Ok(ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// First line printed by `program --version`, if it runs at all.
pub async fn tool_version(program: &Path) -> Option<String> {
    let output = run_tool(program, ["--version"], Duration::from_secs(VERSION_PROBE_SECS))
        .await
        .ok()?;
    output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
}

fn tool_name(program: &Path) -> String {
    program
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
