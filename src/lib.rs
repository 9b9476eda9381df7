//! # cabin - A package manager and build system for C++
//!
//! cabin builds C++ projects the way Cargo builds Rust ones: a declarative
//! `cabin.toml` manifest, automatic source discovery, dependency resolution
//! across git/path/system dependencies, and a dependency-aware build plan
//! executed through ninja.
//!
//! ## Module Organization
//!
//! - [`build`] - Build graph construction, ninja plan emission, and the
//!   build/test/run drivers
//! - [`manifest`] - `cabin.toml` parsing and validation
//! - [`deps`] - Dependency resolution and installation
//! - [`compiler`] - C++ compiler discovery and invocation
//! - [`diag`] - Leveled terminal diagnostics

/// Build graph, ninja plan emission, and build execution.
pub mod build;

/// External process execution helpers.
pub mod command;

/// C++ compiler facade and merged compiler options.
pub mod compiler;

/// Dependency resolution (git, path, system).
pub mod deps;

/// Leveled terminal diagnostics.
pub mod diag;

/// Manifest (`cabin.toml`) parsing and validation.
pub mod manifest;

/// Process-wide parallelism level.
pub mod parallel;

/// Path normalization helpers.
pub mod paths;
