//! Scoped external process execution
//!
//! Every external collaborator (inference executable, synthesizer, score
//! engraver) goes through [`run_tool`]: the child is killed when the call
//! is abandoned, its exit status is checked, and stderr is captured into
//! the error. [`ScratchFile`] removes intermediate files on every exit path.

use mts_common::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Maximum stderr bytes kept in an error message
const STDERR_LIMIT: usize = 4096;

/// A configured command line, optionally prefixed by a wrapper
///
/// `"xvfb-run -a mscore"` parses to program `xvfb-run` with leading
/// arguments `-a mscore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("empty tool command".to_string()))?;
        Ok(Self {
            program,
            leading_args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Label used in logs and errors (last path component of the real tool)
    pub fn label(&self) -> String {
        let tool = self.leading_args.last().unwrap_or(&self.program);
        Path::new(tool)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tool.clone())
    }
}

/// Captured output of a successful run
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run a tool to completion under a time budget
///
/// # Errors
/// * `ExternalTool` - tool missing, spawn failure or non-zero exit
/// * `Timeout` - budget exceeded (the child is killed)
pub async fn run_tool(
    tool: &ToolCommand,
    args: Vec<OsString>,
    stage: &'static str,
    timeout: Duration,
) -> Result<ToolOutput> {
    let label = tool.label();
    debug!(tool = %label, stage, ?args, "Spawning external tool");

    let child = Command::new(&tool.program)
        .args(&tool.leading_args)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::ExternalTool {
            tool: label.clone(),
            status: if e.kind() == std::io::ErrorKind::NotFound {
                "not installed".to_string()
            } else {
                "spawn failed".to_string()
            },
            stderr: e.to_string(),
        })?;

    // Dropping the future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(tool = %label, stage, seconds = timeout.as_secs(), "External tool timed out");
            return Err(Error::Timeout {
                stage,
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        return Err(Error::ExternalTool {
            tool: label,
            status,
            stderr: truncate_stderr(&output.stderr),
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Remove an earlier run's file at `path` so a later [`require_output`]
/// only accepts what the current run wrote
pub async fn remove_stale_output(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Fail with `ExternalTool` when a tool exited cleanly but wrote nothing
pub fn require_output(tool: &ToolCommand, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::ExternalTool {
            tool: tool.label(),
            status: "exit code 0".to_string(),
            stderr: format!("expected output not produced: {}", path.display()),
        })
    }
}

fn truncate_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_LIMIT {
        return text.to_string();
    }
    let mut end = STDERR_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Intermediate file removed when the guard goes out of scope
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Unique file in the system temp directory
    pub fn in_temp_dir(prefix: &str, extension: &str) -> Self {
        let name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        Self::new(std::env::temp_dir().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file"),
        }
    }
}
