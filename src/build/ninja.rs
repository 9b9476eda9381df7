//! Materialization of the build graph as Ninja files.
//!
//! Four files are written into the profile's out directory: `build.ninja`
//! (header plus includes and defaults), `config.ninja` (toolchain variable
//! bindings), `rules.ninja` (the three rules), and `targets.ninja` (one
//! `build` stanza per edge plus the phony aggregates).

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

pub const NINJA_FILE: &str = "build.ninja";
const CONFIG_FILE: &str = "config.ninja";
const RULES_FILE: &str = "rules.ninja";
const TARGETS_FILE: &str = "targets.ninja";

/// One `build <outputs>: <rule> <inputs> | <implicit> || <order-only>`
/// stanza with its per-edge variable bindings.
#[derive(Debug, Clone, Default)]
pub struct NinjaEdge {
    pub outputs: Vec<String>,
    pub rule: String,
    pub inputs: Vec<String>,
    pub implicit_inputs: Vec<String>,
    pub order_only_inputs: Vec<String>,
    pub bindings: Vec<(String, String)>,
}

/// The resolved toolchain variables written into `config.ninja`.
#[derive(Debug, Clone, Default)]
pub struct NinjaToolchain {
    pub cxx: String,
    pub cxx_flags: String,
    pub defines: String,
    pub includes: String,
    pub ld_flags: String,
    pub libs: String,
    pub archiver: String,
}

#[derive(Debug)]
pub struct NinjaPlan {
    out_base_path: PathBuf,
    edges: Vec<NinjaEdge>,
    default_targets: Vec<String>,
    test_targets: Vec<String>,
}

/// Escape `$`, space, and `:` in a ninja path token.
fn escape(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '$' => escaped.push_str("$$"),
            ' ' => escaped.push_str("$ "),
            ':' => escaped.push_str("$:"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn join_escaped(paths: &[String]) -> String {
    paths.iter().map(|p| escape(p)).collect::<Vec<_>>().join(" ")
}

impl NinjaPlan {
    pub fn new(out_base_path: PathBuf) -> NinjaPlan {
        NinjaPlan {
            out_base_path,
            edges: Vec::new(),
            default_targets: Vec::new(),
            test_targets: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.edges.clear();
        self.default_targets.clear();
        self.test_targets.clear();
    }

    pub fn add_edge(&mut self, edge: NinjaEdge) {
        self.edges.push(edge);
    }

    pub fn add_default_target(&mut self, target: String) {
        self.default_targets.push(target);
    }

    pub fn set_test_targets(&mut self, test_targets: Vec<String>) {
        self.test_targets = test_targets;
    }

    fn render_build_ninja(&self) -> String {
        let mut out = String::new();
        out.push_str("# This file is automatically generated by cabin.\n");
        out.push_str("ninja_required_version = 1.11\n\n");
        let _ = writeln!(out, "include {CONFIG_FILE}");
        let _ = writeln!(out, "include {RULES_FILE}");
        let _ = writeln!(out, "include {TARGETS_FILE}");
        if !self.default_targets.is_empty() {
            let _ = writeln!(out, "\ndefault {}", join_escaped(&self.default_targets));
        }
        out
    }

    fn render_config_ninja(toolchain: &NinjaToolchain) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CXX = {}", toolchain.cxx);
        let _ = writeln!(out, "CXXFLAGS = {}", toolchain.cxx_flags);
        let _ = writeln!(out, "DEFINES = {}", toolchain.defines);
        let _ = writeln!(out, "INCLUDES = {}", toolchain.includes);
        let _ = writeln!(out, "LDFLAGS = {}", toolchain.ld_flags);
        let _ = writeln!(out, "LIBS = {}", toolchain.libs);
        out
    }

    fn render_rules_ninja(toolchain: &NinjaToolchain) -> String {
        let mut out = String::new();
        out.push_str("rule cxx_compile\n");
        out.push_str(
            "  command = $CXX $DEFINES $INCLUDES $CXXFLAGS $extra_flags -c $in -o $out\n",
        );
        out.push_str("  description = Compiling $in\n\n");

        out.push_str("rule cxx_link_exe\n");
        out.push_str("  command = $CXX $in $LDFLAGS $LIBS -o $out\n");
        out.push_str("  description = Linking $out\n\n");

        out.push_str("rule cxx_link_static_lib\n");
        let _ = writeln!(out, "  command = {} rcs $out $in", toolchain.archiver);
        out.push_str("  description = Archiving $out\n");
        out
    }

    fn render_targets_ninja(&self) -> String {
        let mut out = String::new();
        for edge in &self.edges {
            let _ = write!(
                out,
                "build {}: {} {}",
                join_escaped(&edge.outputs),
                edge.rule,
                join_escaped(&edge.inputs)
            );
            if !edge.implicit_inputs.is_empty() {
                let _ = write!(out, " | {}", join_escaped(&edge.implicit_inputs));
            }
            if !edge.order_only_inputs.is_empty() {
                let _ = write!(out, " || {}", join_escaped(&edge.order_only_inputs));
            }
            out.push('\n');
            for (key, value) in &edge.bindings {
                let _ = writeln!(out, "  {key} = {value}");
            }
        }

        if !self.default_targets.is_empty() {
            let _ = writeln!(out, "\nbuild all: phony {}", join_escaped(&self.default_targets));
        }
        if !self.test_targets.is_empty() {
            let _ = writeln!(out, "\nbuild tests: phony {}", join_escaped(&self.test_targets));
        }
        out
    }

    pub fn write_files(&self, toolchain: &NinjaToolchain) -> Result<()> {
        fs::create_dir_all(&self.out_base_path).with_context(|| {
            format!("failed to create `{}`", self.out_base_path.display())
        })?;

        let files = [
            (NINJA_FILE, self.render_build_ninja()),
            (CONFIG_FILE, Self::render_config_ninja(toolchain)),
            (RULES_FILE, Self::render_rules_ninja(toolchain)),
            (TARGETS_FILE, self.render_targets_ninja()),
        ];
        for (name, content) in files {
            let path = self.out_base_path.join(name);
            fs::write(&path, content)
                .with_context(|| format!("failed to write `{}`", path.display()))?;
        }
        Ok(())
    }
}
