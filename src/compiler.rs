//! C++ compiler facade.
//!
//! Locates the compiler, builds `-c`/`-MM`/`-E` invocations, models the
//! merged compiler options contributed by profiles and dependencies, and
//! resolves the archiver that matches the compiler's LTO ABI.

use crate::command::{capture_stdout, command_exists};
use anyhow::{Result, bail};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A `-D<name>[=<value>]` preprocessor definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub value: String,
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "-D{}", self.name)
        } else {
            write!(f, "-D{}={}", self.name, self.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDir {
    pub path: PathBuf,
    pub is_system: bool,
}

impl IncludeDir {
    pub fn new(path: PathBuf, is_system: bool) -> Self {
        Self { path, is_system }
    }
}

impl fmt::Display for IncludeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system {
            write!(f, "-isystem {}", self.path.display())
        } else {
            write!(f, "-I{}", self.path.display())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibDir {
    pub path: PathBuf,
}

impl fmt::Display for LibDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-L{}", self.path.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lib {
    pub name: String,
}

impl fmt::Display for Lib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-l{}", self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CFlags {
    pub macros: Vec<Macro>,
    pub include_dirs: Vec<IncludeDir>,
    pub others: Vec<String>,
}

impl CFlags {
    /// Classify whitespace-separated `pkg-config --cflags` output. Splitting
    /// is whitespace-only; quoted tokens are not recognized.
    pub fn from_pkg_config_output(output: &str) -> CFlags {
        let mut flags = CFlags::default();
        for token in output.split_whitespace() {
            if let Some(macro_def) = token.strip_prefix("-D") {
                let (name, value) = match macro_def.split_once('=') {
                    Some((name, value)) => (name.to_string(), value.to_string()),
                    None => (macro_def.to_string(), String::new()),
                };
                flags.macros.push(Macro { name, value });
            } else if let Some(dir) = token.strip_prefix("-I") {
                flags
                    .include_dirs
                    .push(IncludeDir::new(PathBuf::from(dir), false));
            } else {
                flags.others.push(token.to_string());
            }
        }
        flags
    }

    pub fn merge(&mut self, other: &CFlags) {
        self.macros.extend(other.macros.iter().cloned());
        self.include_dirs.extend(other.include_dirs.iter().cloned());
        self.others.extend(other.others.iter().cloned());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdFlags {
    pub lib_dirs: Vec<LibDir>,
    pub libs: Vec<Lib>,
    pub others: Vec<String>,
}

impl LdFlags {
    /// Libs are deduplicated by name, keeping the first occurrence.
    pub fn new(lib_dirs: Vec<LibDir>, libs: Vec<Lib>, others: Vec<String>) -> LdFlags {
        let mut flags = LdFlags {
            lib_dirs,
            libs: Vec::new(),
            others,
        };
        for lib in libs {
            flags.push_lib(lib);
        }
        flags
    }

    pub fn from_pkg_config_output(output: &str) -> LdFlags {
        let mut lib_dirs = Vec::new();
        let mut libs = Vec::new();
        let mut others = Vec::new();
        for token in output.split_whitespace() {
            if let Some(dir) = token.strip_prefix("-L") {
                lib_dirs.push(LibDir { path: PathBuf::from(dir) });
            } else if let Some(name) = token.strip_prefix("-l") {
                libs.push(Lib { name: name.to_string() });
            } else {
                others.push(token.to_string());
            }
        }
        LdFlags::new(lib_dirs, libs, others)
    }

    fn push_lib(&mut self, lib: Lib) {
        if !self.libs.iter().any(|l| l.name == lib.name) {
            self.libs.push(lib);
        }
    }

    pub fn merge(&mut self, other: &LdFlags) {
        self.lib_dirs.extend(other.lib_dirs.iter().cloned());
        self.others.extend(other.others.iter().cloned());
        for lib in &other.libs {
            self.push_lib(lib.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOpts {
    pub c_flags: CFlags,
    pub ld_flags: LdFlags,
}

impl CompilerOpts {
    /// Query pkg-config for a rendered constraint string such as
    /// `fmt >= 9.1.0` and classify both flag sets.
    pub fn parse_pkg_config(pkg_config_spec: &str) -> Result<CompilerOpts> {
        let mut cflags_cmd = Command::new("pkg-config");
        cflags_cmd.arg("--cflags").arg(pkg_config_spec);
        let c_flags = CFlags::from_pkg_config_output(&capture_stdout(cflags_cmd)?);

        let mut libs_cmd = Command::new("pkg-config");
        libs_cmd.arg("--libs").arg(pkg_config_spec);
        let ld_flags = LdFlags::from_pkg_config_output(&capture_stdout(libs_cmd)?);

        Ok(CompilerOpts { c_flags, ld_flags })
    }

    pub fn merge(&mut self, other: &CompilerOpts) {
        self.c_flags.merge(&other.c_flags);
        self.ld_flags.merge(&other.ld_flags);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompilerFlavor {
    Clang,
    Gcc,
    Other,
}

fn detect_compiler_flavor(cxx_path: &Path) -> CompilerFlavor {
    let name = cxx_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.contains("clang") {
        CompilerFlavor::Clang
    } else if name.contains("g++") || name.contains("gcc") {
        CompilerFlavor::Gcc
    } else {
        CompilerFlavor::Other
    }
}

/// Substitute `suffix` (a compiler name such as `clang++`) inside a compiler
/// filename with `tool` (the matching archiver), preserving any
/// cross-compile prefix and version postfix. The match must sit at the start
/// of the name or after a non-alphanumeric boundary.
fn make_tool_name_for_compiler(compiler_name: &str, suffix: &str, tool: &str) -> Option<String> {
    let pos = compiler_name.rfind(suffix)?;
    if pos != 0 {
        let prev = compiler_name.as_bytes()[pos - 1];
        if prev.is_ascii_alphanumeric() {
            return None;
        }
    }
    Some(format!(
        "{}{}{}",
        &compiler_name[..pos],
        tool,
        &compiler_name[pos + suffix.len()..]
    ))
}

fn find_sibling_tool(cxx_path: &Path, candidate: &str) -> Option<String> {
    let sibling = cxx_path.parent()?.join(candidate);
    if sibling.exists() {
        return Some(sibling.to_string_lossy().into_owned());
    }
    None
}

fn resolve_tool_with_suffix(cxx_path: &Path, suffix: &str, tool: &str) -> Option<String> {
    let filename = cxx_path.file_name()?.to_string_lossy().into_owned();
    let candidate = make_tool_name_for_compiler(&filename, suffix, tool)?;
    if let Some(sibling) = find_sibling_tool(cxx_path, &candidate) {
        return Some(sibling);
    }
    if command_exists(&candidate) {
        return Some(candidate);
    }
    None
}

fn resolve_llvm_ar(cxx_path: &Path) -> Option<String> {
    resolve_tool_with_suffix(cxx_path, "clang++", "llvm-ar")
        .or_else(|| resolve_tool_with_suffix(cxx_path, "clang", "llvm-ar"))
        .or_else(|| command_exists("llvm-ar").then(|| "llvm-ar".to_string()))
}

fn resolve_gcc_ar(cxx_path: &Path) -> Option<String> {
    resolve_tool_with_suffix(cxx_path, "g++", "gcc-ar")
        .or_else(|| resolve_tool_with_suffix(cxx_path, "gcc", "gcc-ar"))
        .or_else(|| command_exists("gcc-ar").then(|| "gcc-ar".to_string()))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_archiver_override() -> Option<String> {
    env_var("CABIN_AR")
        .or_else(|| env_var("AR"))
        .or_else(|| env_var("LLVM_AR"))
        .or_else(|| env_var("GCC_AR"))
}

#[derive(Debug, Clone)]
pub struct Compiler {
    pub cxx: String,
}

impl Compiler {
    /// Honor `$CXX`, then try `c++`, `g++`, `clang++` on `PATH`.
    pub fn init() -> Result<Compiler> {
        if let Some(cxx) = env_var("CXX") {
            return Ok(Compiler { cxx });
        }
        for candidate in ["c++", "g++", "clang++"] {
            if command_exists(candidate) {
                return Ok(Compiler { cxx: candidate.to_string() });
            }
        }
        bail!("failed to locate a C++ compiler, set $CXX");
    }

    fn base_cmd(&self, opts: &CompilerOpts) -> Command {
        let mut cmd = Command::new(&self.cxx);
        cmd.args(&opts.c_flags.others);
        cmd.args(opts.c_flags.macros.iter().map(ToString::to_string));
        cmd.args(opts.c_flags.include_dirs.iter().map(ToString::to_string));
        cmd
    }

    pub fn make_compile_cmd(
        &self,
        opts: &CompilerOpts,
        source_file: &Path,
        obj_file: &Path,
    ) -> Command {
        let mut cmd = self.base_cmd(opts);
        cmd.arg("-c").arg(source_file).arg("-o").arg(obj_file);
        cmd
    }

    pub fn make_mm_cmd(&self, opts: &CompilerOpts, source_file: &Path) -> Command {
        let mut cmd = self.base_cmd(opts);
        cmd.arg("-MM").arg(source_file);
        cmd
    }

    pub fn make_preprocess_cmd(&self, opts: &CompilerOpts, source_file: &Path) -> Command {
        let mut cmd = Command::new(&self.cxx);
        cmd.arg("-E");
        cmd.args(&opts.c_flags.others);
        cmd.args(opts.c_flags.macros.iter().map(ToString::to_string));
        cmd.args(opts.c_flags.include_dirs.iter().map(ToString::to_string));
        cmd.arg(source_file);
        cmd
    }

    /// Pick the archiver: env overrides win, plain `ar` without LTO, and the
    /// compiler-flavored `llvm-ar`/`gcc-ar` when LTO is on.
    pub fn detect_archiver(&self, use_lto: bool) -> String {
        if let Some(archiver) = env_archiver_override() {
            return archiver;
        }
        if !use_lto {
            return "ar".to_string();
        }

        let cxx_path = PathBuf::from(&self.cxx);
        let resolved = match detect_compiler_flavor(&cxx_path) {
            CompilerFlavor::Clang => resolve_llvm_ar(&cxx_path),
            CompilerFlavor::Gcc => resolve_gcc_ar(&cxx_path),
            CompilerFlavor::Other => None,
        };
        resolved.unwrap_or_else(|| "ar".to_string())
    }
}
