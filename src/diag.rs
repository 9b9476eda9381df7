//! Leveled terminal diagnostics.
//!
//! All user-facing output goes through this module: Cargo-style status lines
//! with a right-aligned verb (`   Compiling foo v0.1.0 (...)`), plus
//! `Warning:` and `Error:` prefixed messages. Everything is written to
//! stderr so that program output on stdout stays clean.

use colored::Colorize;
use std::fmt::Display;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Off = 0,   // --quiet
    Error = 1,
    Warn = 2,
    Info = 3,  // default
    Debug = 4, // --verbose
    Trace = 5, // -vv
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

fn level() -> u8 {
    LEVEL.load(Ordering::Relaxed)
}

pub fn is_verbose() -> bool {
    level() >= Level::Debug as u8
}

pub fn is_very_verbose() -> bool {
    level() >= Level::Trace as u8
}

/// Resolve the color policy from `--color` and `CABIN_TERM_COLOR`.
///
/// The CLI flag wins over the environment variable. `auto` leaves the
/// decision to whether stderr is a terminal.
pub fn init_color(cli_choice: Option<&str>) -> anyhow::Result<()> {
    let choice = match cli_choice {
        Some(c) => Some(c.to_string()),
        None => std::env::var("CABIN_TERM_COLOR").ok(),
    };
    match choice.as_deref() {
        Some("always") => colored::control::set_override(true),
        Some("never") => colored::control::set_override(false),
        Some("auto") | None => {}
        Some(other) => anyhow::bail!("invalid color mode: `{other}`"),
    }
    Ok(())
}

/// A Cargo-style status line: the verb is right-aligned to 12 columns.
pub fn status(verb: &str, msg: impl Display) {
    if level() >= Level::Info as u8 {
        eprintln!("{} {}", format!("{verb:>12}").green().bold(), msg);
    }
}

pub fn warn(msg: impl Display) {
    if level() >= Level::Warn as u8 {
        eprintln!("{} {}", "Warning:".yellow().bold(), msg);
    }
}

pub fn error(msg: impl Display) {
    if level() >= Level::Error as u8 {
        eprintln!("{} {}", "Error:".red().bold(), msg);
    }
}

pub fn debug(msg: impl Display) {
    if is_verbose() {
        eprintln!("{} {}", "debug:".dimmed(), msg);
    }
}

pub fn trace(msg: impl Display) {
    if is_very_verbose() {
        eprintln!("{} {}", "trace:".dimmed(), msg);
    }
}
