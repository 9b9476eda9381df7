//! End-to-end tests for `cabin remove`.

mod helpers;

use helpers::*;
use std::fs;

const MANIFEST_WITH_DEPS: &str = r#"[package]
name = "app"
version = "0.1.0"
edition = "20"

# project dependencies
[dependencies]
fmt = { git = "https://github.com/fmtlib/fmt", tag = "11.0.2" }
spdlog = { git = "https://github.com/gabime/spdlog" }
zlib = { system = true, version = ">=1.2" }
"#;

#[test]
fn remove_drops_the_named_dependency() {
    let tmp = TempDir::new("remove_one");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), MANIFEST_WITH_DEPS);

    let output = run_cabin(&["remove", "spdlog"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Removed spdlog from"), "{stderr}");

    let rewritten = fs::read_to_string(project.join("cabin.toml")).unwrap();
    assert!(!rewritten.contains("spdlog"));
    assert!(rewritten.contains("fmt"));
    assert!(rewritten.contains("zlib"));
    // Formatting and comments survive the edit.
    assert!(rewritten.contains("# project dependencies"));
}

#[test]
fn remove_accepts_multiple_dependencies() {
    let tmp = TempDir::new("remove_many");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), MANIFEST_WITH_DEPS);

    let output = run_cabin(&["remove", "fmt", "zlib"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Removed fmt, zlib from"), "{stderr}");

    let rewritten = fs::read_to_string(project.join("cabin.toml")).unwrap();
    assert!(!rewritten.contains("fmt ="));
    assert!(!rewritten.contains("zlib"));
    assert!(rewritten.contains("spdlog"));
}

#[test]
fn remove_warns_about_unknown_dependencies() {
    let tmp = TempDir::new("remove_unknown");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), MANIFEST_WITH_DEPS);

    let output = run_cabin(&["remove", "nonexistent"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Warning:"), "{stderr}");
    assert!(stderr.contains("`nonexistent` not found"), "{stderr}");

    // Nothing removed, nothing rewritten.
    let rewritten = fs::read_to_string(project.join("cabin.toml")).unwrap();
    assert_eq!(rewritten, MANIFEST_WITH_DEPS);
}

#[test]
fn remove_without_dependency_table_is_an_error() {
    let tmp = TempDir::new("remove_empty");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("app"));

    let output = run_cabin(&["remove", "fmt"], project);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("No dependencies to remove"));
}
