//! Command execution utilities
//!
//! Provides consistent invocation of the PostgreSQL client and server tools
//! with proper error handling and logging.

use anyhow::{Context, Result};
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// An external tool ran but exited unsuccessfully.
///
/// The exit code is what the entrypoint itself exits with, so callers should
/// propagate this error untouched.
#[derive(Debug, Error)]
#[error("{tool} failed (exit {}){}", code_label(.code), stderr_suffix(.stderr))]
pub struct ToolError {
    pub tool: String,
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolError {
    /// Exit code to report; a tool killed by a signal maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self.code {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

fn code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Result of a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Turn a failed execution into a [`ToolError`], returning stdout otherwise.
    pub fn checked(self, cmd: &str) -> Result<String, ToolError> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(ToolError {
                tool: cmd.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

fn build(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Command {
    let mut command = Command::new(cmd);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command
}

/// Run a command and return its captured output.
///
/// This is a low-level function that returns both stdout and stderr.
/// Use `run_checked` if you want to treat non-zero exit as an error.
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<CommandOutput> {
    debug!(args = ?args, "Running command");

    let output = build(cmd, args, envs)
        .stdin(Stdio::null())
        .output()
        .await
        .context(format!("Failed to execute {}", cmd))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}

/// Run a command and return stdout if successful, a [`ToolError`] otherwise.
///
/// # Example
/// ```ignore
/// let version = run_checked("postgres", &["--version"], &[]).await?;
/// ```
pub async fn run_checked(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
    let output = run(cmd, args, envs).await?;
    Ok(output.checked(cmd)?)
}

/// Run a command feeding `input` on stdin, returning stdout if successful.
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run_with_input(
    cmd: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    input: &[u8],
) -> Result<String> {
    debug!(args = ?args, bytes = input.len(), "Running command with input");

    let mut child = build(cmd, args, envs)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context(format!("Failed to spawn {}", cmd))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input)
            .await
            .context(format!("Failed to write to {} stdin", cmd))?;
    }

    let output = child
        .wait_with_output()
        .await
        .context(format!("Failed to wait for {}", cmd))?;

    let output = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
        code: output.status.code(),
    };
    Ok(output.checked(cmd)?)
}

/// Run a command attached to the caller's stdio and fail unless it exits 0.
///
/// Used for tools whose output is the product (query results, dumps, proxies).
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run_inherited(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<()> {
    debug!(args = ?args, "Running attached command");

    let status = build(cmd, args, envs)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .context(format!("Failed to execute {}", cmd))?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolError {
            tool: cmd.to_string(),
            code: status.code(),
            stderr: String::new(),
        }
        .into())
    }
}

/// Replace the current process with `cmd`.
///
/// Only returns if the exec itself failed.
pub fn exec(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> anyhow::Error {
    debug!(cmd = %cmd, args = ?args, "Exec");

    let mut command = std::process::Command::new(cmd);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    let err = command.exec();

    anyhow::anyhow!("Failed to exec {}: {}", cmd, err)
}
