//! Thin helpers around external process execution.
//!
//! Every external tool (the C++ compiler, ninja, pkg-config) is driven
//! through these helpers so that verbose logging and error surfacing stay
//! uniform: captured output is drained fully before the handle is dropped,
//! and a non-zero exit status is reported verbatim.

use crate::diag;
use anyhow::{Context, Result, ensure};
use std::process::{Command, ExitStatus, Output, Stdio};

fn display_command(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Whether `name` resolves to an executable on `PATH`.
pub fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run a command with captured stdio, without judging the exit status.
pub fn capture(mut cmd: Command) -> Result<Output> {
    diag::trace(format!("running: {}", display_command(&cmd)));
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.output()
        .with_context(|| format!("failed to execute `{program}`"))
}

/// Run a command and return its stdout; a non-zero exit is an error that
/// carries the tool's stderr.
pub fn capture_stdout(cmd: Command) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = capture(cmd)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim_end();
        if stderr.is_empty() {
            anyhow::bail!("`{}` exited with {}", program, output.status);
        }
        anyhow::bail!("`{}` exited with {}\n{}", program, output.status, stderr);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command with inherited stdio and return its exit status.
pub fn exec(mut cmd: Command) -> Result<ExitStatus> {
    diag::trace(format!("running: {}", display_command(&cmd)));
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.status()
        .with_context(|| format!("failed to execute `{program}`"))
}

/// Like [`exec`], but a non-zero exit status is an error.
pub fn exec_checked(cmd: Command, what: &str) -> Result<ExitStatus> {
    let status = exec(cmd)?;
    ensure!(status.success(), "{what} {status}");
    Ok(status)
}
