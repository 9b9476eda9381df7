//! Shared helpers for integration tests.
//!
//! Tests materialize throwaway C++ projects under the system temp directory
//! and drive the compiled `cabin` binary against them. Scenarios that need
//! the external toolchain (a C++ compiler, ninja, ar) are skipped when it
//! is not installed.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn cabin_bin() -> &'static str {
    env!("CARGO_BIN_EXE_cabin")
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub struct TempDir {
    pub path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> TempDir {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join("cabin_tests")
            .join(format!("{name}_{}_{id}", std::process::id()));
        if path.exists() {
            fs::remove_dir_all(&path).ok();
        }
        fs::create_dir_all(&path).expect("failed to create test directory");
        TempDir { path }
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.path).ok();
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent directory");
    }
    fs::write(path, content).expect("failed to write file");
}

pub fn manifest(name: &str) -> String {
    format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"20\"\n")
}

pub fn run_cabin(args: &[&str], cwd: &Path) -> Output {
    run_cabin_env(args, cwd, &[])
}

pub fn run_cabin_env(args: &[&str], cwd: &Path, envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(cabin_bin());
    cmd.args(args)
        .current_dir(cwd)
        .env("CABIN_TERM_COLOR", "never");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to run cabin")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn tool_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Whether the external toolchain the build scenarios need is available.
/// Callers skip (and say so) when it is not.
pub fn have_build_tools() -> bool {
    tool_exists("ninja") && tool_exists("ar") && (std::env::var_os("CXX").is_some() || tool_exists("c++"))
}

pub const HELLO_MAIN: &str = r#"#include <iostream>

int main() {
  std::cout << "Hello, world!" << std::endl;
  return 0;
}
"#;
