//! Dependency resolution and installation.
//!
//! Dependencies come in three kinds: git clones, local path dependencies
//! (built recursively as full projects), and system packages queried through
//! pkg-config. Resolution is a depth-first walk; each dependency's identity
//! is `(kind, canonical detail)`, and the same name resolving to two
//! different identities anywhere in the walk is an error.

mod git;
mod manage;
mod system;

pub use git::GitDependency;
pub use manage::remove_dependencies;
pub use system::SystemDependency;

use crate::build::{Builder, ScheduleOptions};
use crate::compiler::{CompilerOpts, IncludeDir, Lib, LibDir};
use crate::diag;
use crate::manifest::{BuildProfile, Manifest};
use crate::paths;
use anyhow::{Result, bail, ensure};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathDependency {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Dependency {
    Git(GitDependency),
    Path(PathDependency),
    System(SystemDependency),
}

impl Dependency {
    pub fn name(&self) -> &str {
        match self {
            Dependency::Git(dep) => &dep.name,
            Dependency::Path(dep) => &dep.name,
            Dependency::System(dep) => &dep.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepKind {
    Git,
    Path,
    System,
}

/// Identity of a dependency as seen from some manifest. Two manifests may
/// name the same dependency only if their keys agree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DepKey {
    kind: DepKind,
    detail: String,
}

fn make_dep_key(base_dir: &Path, dep: &Dependency) -> DepKey {
    match dep {
        Dependency::Git(git) => {
            let mut detail = git.url.clone();
            if let Some(target) = &git.target {
                detail.push('#');
                detail.push_str(target);
            }
            DepKey { kind: DepKind::Git, detail }
        }
        Dependency::System(sys) => DepKey {
            kind: DepKind::System,
            detail: sys.version_req.to_string(),
        },
        Dependency::Path(path_dep) => {
            let canonical = paths::weakly_canonical(&base_dir.join(&path_dep.path));
            DepKey {
                kind: DepKind::Path,
                detail: paths::generic_string(&canonical),
            }
        }
    }
}

/// `<install>/include` when it exists and is non-empty, else the install
/// directory itself.
pub(crate) fn resolve_include_dir(install_dir: &Path) -> PathBuf {
    let include_dir = install_dir.join("include");
    let non_empty = fs::read_dir(&include_dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if non_empty { include_dir } else { install_dir.to_path_buf() }
}

struct Resolver {
    build_profile: BuildProfile,
    include_dev_deps: bool,
    suppress_dep_diag: bool,
    seen: HashMap<String, DepKey>,
    visited: HashSet<PathBuf>,
}

impl Resolver {
    fn remember(&mut self, base_dir: &Path, dep: &Dependency) -> Result<()> {
        let key = make_dep_key(base_dir, dep);
        let name = dep.name();
        match self.seen.get(name) {
            Some(existing) if *existing != key => {
                bail!("dependency `{name}` conflicts across manifests")
            }
            Some(_) => {}
            None => {
                self.seen.insert(name.to_string(), key);
            }
        }
        Ok(())
    }

    fn install_manifest(
        &mut self,
        manifest: &Manifest,
        is_root: bool,
        installed: &mut Vec<CompilerOpts>,
    ) -> Result<()> {
        for dep in &manifest.dependencies {
            self.install_one(manifest, dep, installed)?;
        }
        if self.include_dev_deps && is_root {
            for dep in &manifest.dev_dependencies {
                self.install_one(manifest, dep, installed)?;
            }
        }
        Ok(())
    }

    fn install_one(
        &mut self,
        manifest: &Manifest,
        dep: &Dependency,
        installed: &mut Vec<CompilerOpts>,
    ) -> Result<()> {
        self.remember(manifest.root_dir()?, dep)?;
        match dep {
            Dependency::Git(git) => {
                let mut opts = git.install()?;

                // A git dependency that carries its own manifest pulls in
                // its dependencies transitively.
                let dep_manifest_path = git.install_dir()?.join(Manifest::FILE_NAME);
                if dep_manifest_path.exists() {
                    let dep_manifest = Manifest::parse(&dep_manifest_path)?;
                    let mut nested = Vec::new();
                    self.install_manifest(&dep_manifest, false, &mut nested)?;
                    for nested_opts in &nested {
                        opts.merge(nested_opts);
                    }
                }
                installed.push(opts);
            }
            Dependency::System(sys) => installed.push(sys.install()?),
            Dependency::Path(path_dep) => {
                self.install_path_dep(manifest, path_dep, installed)?;
            }
        }
        Ok(())
    }

    fn install_path_dep(
        &mut self,
        manifest: &Manifest,
        dep: &PathDependency,
        installed: &mut Vec<CompilerOpts>,
    ) -> Result<()> {
        let base_dir = manifest.root_dir()?;
        let dep_root = paths::weakly_canonical(&base_dir.join(&dep.path));
        ensure!(
            dep_root.is_dir(),
            "`{}` can't be accessed as a directory",
            dep_root.display()
        );
        if !self.visited.insert(dep_root.clone()) {
            return Ok(());
        }

        let dep_manifest_path = dep_root.join(Manifest::FILE_NAME);
        ensure!(
            dep_manifest_path.exists(),
            "missing `{}` in path dependency {}",
            Manifest::FILE_NAME,
            dep_root.display()
        );
        let dep_manifest = Manifest::parse(&dep_manifest_path)?;

        if !self.suppress_dep_diag {
            diag::status(
                "Building",
                format!("{} ({})", dep_manifest.package.name, dep_root.display()),
            );
        }

        let mut builder = Builder::new(dep_root.clone(), self.build_profile);
        builder.schedule(ScheduleOptions {
            include_dev_deps: false,
            enable_coverage: false,
            suppress_analysis_log: true,
            suppress_finish_log: true,
            suppress_dep_diag: self.suppress_dep_diag,
        })?;
        builder.build()?;

        let graph = builder.graph()?;
        let dep_out_dir = graph.out_base_path().to_path_buf();
        let lib_path = dep_out_dir.join(graph.library_name());
        let has_library_target = graph.has_library_target();

        let mut path_opts = CompilerOpts::default();
        path_opts
            .c_flags
            .include_dirs
            .push(IncludeDir::new(resolve_include_dir(&dep_root), false));

        let mut nested = Vec::new();
        self.install_manifest(&dep_manifest, false, &mut nested)?;
        for nested_opts in &nested {
            path_opts.merge(nested_opts);
        }

        let lib_built = lib_path.exists();
        if has_library_target {
            ensure!(
                lib_built,
                "expected `{}` to be built for dependency {}",
                lib_path.display(),
                dep_manifest.package.name
            );
        }
        if lib_built {
            path_opts.ld_flags.lib_dirs.insert(0, LibDir { path: dep_out_dir });

            let mut lib_name = lib_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(stripped) = lib_name.strip_prefix("lib") {
                lib_name = stripped.to_string();
            }
            path_opts.ld_flags.libs.insert(0, Lib { name: lib_name });
        }

        installed.push(path_opts);
        Ok(())
    }
}

/// Install every dependency of `manifest`, returning one [`CompilerOpts`]
/// per installed dependency. Dev-dependencies are followed only for the
/// root manifest.
pub fn install_deps(
    manifest: &Manifest,
    build_profile: BuildProfile,
    include_dev_deps: bool,
    suppress_dep_diag: bool,
) -> Result<Vec<CompilerOpts>> {
    let mut resolver = Resolver {
        build_profile,
        include_dev_deps,
        suppress_dep_diag,
        seen: HashMap::new(),
        visited: HashSet::new(),
    };
    let mut installed = Vec::new();
    resolver.install_manifest(manifest, true, &mut installed)?;
    Ok(installed)
}
