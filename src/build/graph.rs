//! The dependency-aware build graph.
//!
//! Discovery runs the compiler's `-MM` over every source to learn its header
//! closure, maps headers back to the objects that own them, groups objects
//! into binary/library/test link targets, and materializes everything as a
//! ninja plan. The `-MM` and unit-test detection passes are the one parallel
//! region; results are collected in input order and registered after the
//! join so the emitted plan is deterministic.

use crate::build::ninja::{NINJA_FILE, NinjaEdge, NinjaPlan, NinjaToolchain};
use crate::build::project::Project;
use crate::build::source::{self, SourceRoot};
use crate::command;
use crate::compiler::Compiler;
use crate::deps;
use crate::diag;
use crate::manifest::{BuildProfile, Manifest};
use crate::parallel;
use crate::paths;
use anyhow::{Context, Result, anyhow, bail, ensure};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Unit,
    Integration,
}

impl TestKind {
    pub fn label(self) -> &'static str {
        match self {
            TestKind::Unit => "unit",
            TestKind::Integration => "integration",
        }
    }
}

/// A test executable scheduled by the test profile.
#[derive(Debug, Clone)]
pub struct TestTarget {
    pub ninja_target: String,
    pub source_path: String,
    pub kind: TestKind,
}

/// A source file, its header closure, and whether it compiles with
/// `-DCABIN_TEST`.
#[derive(Debug)]
struct CompileUnit {
    source: String,
    dependencies: HashSet<String>,
    #[allow(dead_code)]
    is_test: bool,
}

/// Result of running `-MM` over one regular source, produced inside the
/// parallel region and registered after the join.
struct ProcessedUnit {
    obj_target: String,
    source: String,
    dependencies: HashSet<String>,
}

/// Result of test discovery over one candidate source.
struct ProcessedTest {
    obj_target: String,
    source: String,
    dependencies: HashSet<String>,
    link_inputs: Vec<String>,
    binary: String,
    source_rel: String,
    kind: TestKind,
}

fn parent_dir_or_dot(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => paths::generic_string(parent),
        _ => ".".to_string(),
    }
}

fn join_display<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn combine_flags(parts: &[&str]) -> String {
    let mut combined = String::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        if !combined.is_empty() {
            combined.push(' ');
        }
        combined.push_str(part);
    }
    combined
}

pub struct BuildGraph {
    out_base_path: PathBuf,
    project: Project,
    compiler: Compiler,
    build_profile: BuildProfile,
    lib_name: String,

    has_binary_target: bool,
    has_library_target: bool,

    compile_units: HashMap<String, CompileUnit>,
    test_targets: Vec<TestTarget>,
    src_object_targets: HashSet<String>,
    archiver: String,

    cxx_flags: String,
    defines: String,
    includes: String,
    ld_flags: String,
    libs: String,

    plan: NinjaPlan,
}

impl BuildGraph {
    pub fn create(manifest: Manifest, build_profile: BuildProfile) -> Result<BuildGraph> {
        let lib_name = if manifest.package.name.starts_with("lib") {
            format!("{}.a", manifest.package.name)
        } else {
            format!("lib{}.a", manifest.package.name)
        };

        let project = Project::init(build_profile, manifest)?;
        let out_base_path = project.out_base_path.clone();
        Ok(BuildGraph {
            plan: NinjaPlan::new(out_base_path.clone()),
            out_base_path,
            project,
            compiler: Compiler::init()?,
            build_profile,
            lib_name,
            has_binary_target: false,
            has_library_target: false,
            compile_units: HashMap::new(),
            test_targets: Vec::new(),
            src_object_targets: HashSet::new(),
            archiver: "ar".to_string(),
            cxx_flags: String::new(),
            defines: String::new(),
            includes: String::new(),
            ld_flags: String::new(),
            libs: String::new(),
        })
    }

    pub fn out_base_path(&self) -> &Path {
        &self.out_base_path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.project.manifest
    }

    pub fn has_binary_target(&self) -> bool {
        self.has_binary_target
    }

    pub fn has_library_target(&self) -> bool {
        self.has_library_target
    }

    pub fn library_name(&self) -> &str {
        &self.lib_name
    }

    pub fn test_targets(&self) -> &[TestTarget] {
        &self.test_targets
    }

    pub fn install_deps(&mut self, include_dev_deps: bool, suppress_dep_diag: bool) -> Result<()> {
        let deps_opts = deps::install_deps(
            &self.project.manifest,
            self.build_profile,
            include_dev_deps,
            suppress_dep_diag,
        )?;
        for opts in &deps_opts {
            self.project.compiler_opts.merge(opts);
        }
        Ok(())
    }

    pub fn enable_coverage(&mut self) {
        let opts = &mut self.project.compiler_opts;
        opts.c_flags.others.push("--coverage".to_string());
        opts.ld_flags.others.push("--coverage".to_string());
    }

    /// The plan is up to date when `file_name` in the out directory is newer
    /// than every file under the watched directories and the manifest.
    pub fn is_up_to_date(&self, file_name: &str) -> bool {
        let file_path = self.out_base_path.join(file_name);
        let Ok(plan_time) = fs::metadata(&file_path).and_then(|m| m.modified()) else {
            return false;
        };

        for dir in ["src", "lib", "include", "tests"] {
            let dir_path = self.project.root_path.join(dir);
            if !dir_path.exists() {
                continue;
            }
            for entry in WalkDir::new(&dir_path).into_iter().filter_map(|e| e.ok()) {
                let Ok(metadata) = entry.metadata() else {
                    return false;
                };
                let Ok(modified) = metadata.modified() else {
                    return false;
                };
                if modified > plan_time {
                    return false;
                }
            }
        }

        fs::metadata(&self.project.manifest.path)
            .and_then(|m| m.modified())
            .map(|modified| modified <= plan_time)
            .unwrap_or(false)
    }

    /// Map a header path back to the object target that owns it. Headers
    /// under `src/` map into the plain object tree; headers under
    /// `include/` or `lib/` map into the `lib/` object subtree.
    fn map_header_to_obj(&self, header_path: &Path) -> String {
        let obj_base = self
            .project
            .build_out_path
            .strip_prefix(&self.out_base_path)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.project.build_out_path.clone());
        let header_dir = header_path.parent().unwrap_or(Path::new(""));
        let stem = header_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let make_obj_path = |rel_dir: &Path, prefix: Option<&str>| -> String {
            let mut obj_path = obj_base.clone();
            if let Some(prefix) = prefix {
                obj_path.push(prefix);
            }
            if !rel_dir.as_os_str().is_empty() && rel_dir != Path::new(".") {
                obj_path.push(rel_dir);
            }
            obj_path.push(format!("{stem}.o"));
            paths::generic_string(&obj_path)
        };
        let try_map = |root_dir: PathBuf, prefix: Option<&str>| -> Option<String> {
            let root = paths::weakly_canonical(&root_dir);
            let dir = paths::weakly_canonical(header_dir);
            dir.strip_prefix(&root)
                .ok()
                .map(|rel| make_obj_path(rel, prefix))
        };

        if let Some(mapped) = try_map(self.project.root_path.join("src"), None) {
            return mapped;
        }
        if let Some(mapped) = try_map(self.project.root_path.join("include"), Some("lib")) {
            return mapped;
        }
        if let Some(mapped) = try_map(self.project.root_path.join("lib"), Some("lib")) {
            return mapped;
        }
        make_obj_path(Path::new(""), None)
    }

    fn run_mm(&self, source_file: &Path, is_test: bool) -> Result<String> {
        let mut cmd = self
            .compiler
            .make_mm_cmd(&self.project.compiler_opts, source_file);
        if is_test {
            cmd.arg("-DCABIN_TEST");
        }
        cmd.current_dir(&self.out_base_path);
        command::capture_stdout(cmd)
    }

    /// A source contains test code iff its preprocessed form differs with
    /// `-DCABIN_TEST` defined. The line scan is only a cheap pre-filter.
    fn contains_test_code(&self, source_file: &Path) -> Result<bool> {
        let content = fs::read_to_string(source_file)
            .with_context(|| format!("failed to read `{}`", source_file.display()))?;
        if !content.lines().any(|line| line.contains("CABIN_TEST")) {
            return Ok(false);
        }

        let plain_cmd = self
            .compiler
            .make_preprocess_cmd(&self.project.compiler_opts, source_file);
        let plain = command::capture_stdout(plain_cmd)?;

        let mut test_cmd = self
            .compiler
            .make_preprocess_cmd(&self.project.compiler_opts, source_file);
        test_cmd.arg("-DCABIN_TEST");
        let with_test = command::capture_stdout(test_cmd)?;

        let contains_test = plain != with_test;
        if contains_test {
            diag::trace(format!("found test code: {}", source_file.display()));
        }
        Ok(contains_test)
    }

    fn register_compile_unit(
        &mut self,
        obj_target: String,
        source: String,
        dependencies: HashSet<String>,
        is_test: bool,
    ) {
        let mut implicit_inputs: Vec<String> = dependencies.iter().cloned().collect();
        implicit_inputs.sort();

        self.plan.add_edge(NinjaEdge {
            outputs: vec![obj_target.clone()],
            rule: "cxx_compile".to_string(),
            inputs: vec![source.clone()],
            implicit_inputs,
            order_only_inputs: Vec::new(),
            bindings: vec![
                ("out_dir".to_string(), parent_dir_or_dot(&obj_target)),
                (
                    "extra_flags".to_string(),
                    if is_test { "-DCABIN_TEST".to_string() } else { String::new() },
                ),
            ],
        });
        self.compile_units
            .insert(obj_target, CompileUnit { source, dependencies, is_test });
    }

    fn process_src(&self, source_file: &Path, root: &SourceRoot) -> Result<ProcessedUnit> {
        let (obj_target, dependencies) = source::parse_mm_output(&self.run_mm(source_file, false)?);

        let parent = source_file.parent().unwrap_or(Path::new(""));
        let rel_dir = parent.strip_prefix(&root.directory).map_err(|_| {
            anyhow!(
                "source file `{}` must reside under `{}`",
                source_file.display(),
                root.directory.display()
            )
        })?;

        let mut build_target_dir = self.project.build_out_path.clone();
        if let Some(subdir) = &root.object_subdir {
            build_target_dir.push(subdir);
        }
        if !rel_dir.as_os_str().is_empty() {
            build_target_dir.push(rel_dir);
        }

        let obj_output = build_target_dir.join(&obj_target);
        let build_obj_target = paths::generic_string(
            obj_output
                .strip_prefix(&self.out_base_path)
                .with_context(|| format!("object `{}` escapes the out directory", obj_output.display()))?,
        );

        Ok(ProcessedUnit {
            obj_target: build_obj_target,
            source: paths::generic_string(source_file),
            dependencies,
        })
    }

    /// Run `-MM` over every source, in parallel when enabled. Worker errors
    /// are aggregated; registration happens after the join, in input order.
    fn process_sources(
        &mut self,
        source_file_paths: &[PathBuf],
        root: &SourceRoot,
    ) -> Result<HashSet<String>> {
        let results: Vec<Result<ProcessedUnit>> = if parallel::is_parallel() {
            let this: &BuildGraph = self;
            source_file_paths
                .par_iter()
                .map(|path| this.process_src(path, root))
                .collect()
        } else {
            source_file_paths
                .iter()
                .map(|path| self.process_src(path, root))
                .collect()
        };

        let mut units = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(unit) => units.push(unit),
                Err(err) => errors.push(format!("{err:#}")),
            }
        }
        if !errors.is_empty() {
            bail!("{}", errors.join("\n"));
        }

        let mut obj_targets = HashSet::new();
        for unit in units {
            obj_targets.insert(unit.obj_target.clone());
            self.register_compile_unit(unit.obj_target, unit.source, unit.dependencies, false);
        }
        Ok(obj_targets)
    }

    /// Walk the header closure starting from `seed_deps`, mapping each
    /// header to its owning object and keeping only objects that are
    /// actually scheduled. Iterative worklist; deep include chains must not
    /// grow the stack.
    fn collect_bin_dep_objs(
        &self,
        collected: &mut HashSet<String>,
        source_file_name: &str,
        seed_deps: &HashSet<String>,
        build_obj_targets: &HashSet<String>,
    ) {
        let mut frontier: Vec<&HashSet<String>> = vec![seed_deps];
        while let Some(dep_set) = frontier.pop() {
            for dep in dep_set {
                let header_path = Path::new(dep);
                if header_path
                    .file_stem()
                    .is_some_and(|stem| stem == source_file_name)
                {
                    continue;
                }
                if !source::is_header_file(header_path) {
                    continue;
                }
                let obj_target = self.map_header_to_obj(header_path);
                if !build_obj_targets.contains(&obj_target) {
                    continue;
                }
                if !collected.insert(obj_target.clone()) {
                    continue;
                }
                if let Some(unit) = self.compile_units.get(&obj_target) {
                    frontier.push(&unit.dependencies);
                }
            }
        }
    }

    fn process_unittest_src(&self, source_file: &Path) -> Result<Option<ProcessedTest>> {
        if !self.contains_test_code(source_file)? {
            return Ok(None);
        }

        let (obj_target, dependencies) = source::parse_mm_output(&self.run_mm(source_file, true)?);

        let mut rel_base = self
            .project
            .unittest_out_path
            .strip_prefix(&self.out_base_path)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from("unit"));

        let canonical_source = paths::weakly_canonical(source_file);
        let src_root = paths::weakly_canonical(&self.project.root_path.join("src"));
        let lib_root = paths::weakly_canonical(&self.project.root_path.join("lib"));
        let project_root = paths::weakly_canonical(&self.project.root_path);

        let push_parent_of = |rel_base: &mut PathBuf, remainder: &Path| {
            if let Some(parent) = remainder.parent() {
                if !parent.as_os_str().is_empty() {
                    rel_base.push(parent);
                }
            }
        };

        let mut is_src_unit = false;
        if let Ok(remainder) = canonical_source.strip_prefix(&src_root) {
            rel_base.push("src");
            push_parent_of(&mut rel_base, remainder);
            is_src_unit = true;
        } else if let Ok(remainder) = canonical_source.strip_prefix(&lib_root) {
            rel_base.push("lib");
            push_parent_of(&mut rel_base, remainder);
        } else if let Ok(remainder) = canonical_source.strip_prefix(&project_root) {
            push_parent_of(&mut rel_base, remainder);
        }

        let test_obj_target = paths::generic_string(&rel_base.join(&obj_target));
        let file_name = source_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let test_binary = paths::generic_string(&rel_base.join(format!("{file_name}.test")));

        let mut link_inputs = vec![test_obj_target.clone()];
        if is_src_unit {
            // A src/ unit test also links the non-main source objects its
            // headers transitively pull in.
            let stem = source_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut src_deps = HashSet::new();
            self.collect_bin_dep_objs(&mut src_deps, &stem, &dependencies, &self.src_object_targets);

            let mut sorted: Vec<String> = src_deps.into_iter().collect();
            sorted.sort();
            link_inputs.extend(sorted);
        }
        if self.has_library_target {
            link_inputs.push(self.lib_name.clone());
        }

        let source_rel = canonical_source
            .strip_prefix(&project_root)
            .map(paths::generic_string)
            .unwrap_or_else(|_| paths::generic_string(source_file));

        Ok(Some(ProcessedTest {
            obj_target: test_obj_target,
            source: paths::generic_string(source_file),
            dependencies,
            link_inputs,
            binary: test_binary,
            source_rel,
            kind: TestKind::Unit,
        }))
    }

    fn process_integration_test_src(&self, source_file: &Path) -> Result<Option<ProcessedTest>> {
        let (obj_target, dependencies) = source::parse_mm_output(&self.run_mm(source_file, true)?);

        let tests_root = self.project.root_path.join("tests");
        let parent = source_file.parent().unwrap_or(Path::new(""));
        let rel_dir = parent.strip_prefix(&tests_root).unwrap_or(Path::new(""));

        let mut test_target_dir = self.project.integration_test_out_path.clone();
        if !rel_dir.as_os_str().is_empty() {
            test_target_dir.push(rel_dir);
        }

        let obj_output = test_target_dir.join(&obj_target);
        let test_obj_target = paths::generic_string(
            obj_output
                .strip_prefix(&self.out_base_path)
                .with_context(|| format!("object `{}` escapes the out directory", obj_output.display()))?,
        );

        let stem = source_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let binary_output = test_target_dir.join(&stem);
        let test_binary = paths::generic_string(
            binary_output
                .strip_prefix(&self.out_base_path)
                .with_context(|| format!("binary `{}` escapes the out directory", binary_output.display()))?,
        );

        let mut link_inputs = vec![test_obj_target.clone()];
        if self.has_library_target {
            link_inputs.push(self.lib_name.clone());
        }
        link_inputs.sort();

        let source_rel = source_file
            .strip_prefix(&self.project.root_path)
            .map(paths::generic_string)
            .unwrap_or_else(|_| paths::generic_string(source_file));

        Ok(Some(ProcessedTest {
            obj_target: test_obj_target,
            source: paths::generic_string(source_file),
            dependencies,
            link_inputs,
            binary: test_binary,
            source_rel,
            kind: TestKind::Integration,
        }))
    }

    fn register_test_target(&mut self, test: ProcessedTest) -> TestTarget {
        self.register_compile_unit(test.obj_target, test.source, test.dependencies, true);
        self.plan.add_edge(NinjaEdge {
            outputs: vec![test.binary.clone()],
            rule: "cxx_link_exe".to_string(),
            inputs: test.link_inputs,
            order_only_inputs: Vec::new(),
            implicit_inputs: Vec::new(),
            bindings: vec![("out_dir".to_string(), parent_dir_or_dot(&test.binary))],
        });
        TestTarget {
            ninja_target: test.binary,
            source_path: test.source_rel,
            kind: test.kind,
        }
    }

    fn process_tests(&self, candidates: &[&PathBuf], integration: bool) -> Result<Vec<ProcessedTest>> {
        let worker = |path: &Path| -> Result<Option<ProcessedTest>> {
            if integration {
                self.process_integration_test_src(path)
            } else {
                self.process_unittest_src(path)
            }
        };

        let results: Vec<Result<Option<ProcessedTest>>> = if parallel::is_parallel() {
            candidates.par_iter().map(|&path| worker(path)).collect()
        } else {
            candidates.iter().map(|&path| worker(path)).collect()
        };

        let mut discovered = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(Some(test)) => discovered.push(test),
                Ok(None) => {}
                Err(err) => errors.push(format!("{err:#}")),
            }
        }
        if !errors.is_empty() {
            bail!("{}", errors.join("\n"));
        }
        Ok(discovered)
    }

    pub fn configure(&mut self) -> Result<()> {
        let src_dir = self.project.root_path.join("src");
        let has_src_dir = src_dir.exists();
        let lib_dir = self.project.root_path.join("lib");

        let profile = self.project.manifest.profile(self.build_profile)?;
        self.archiver = self.compiler.detect_archiver(profile.lto);

        self.has_binary_target = false;
        self.has_library_target = false;

        // The binary target exists iff exactly one `main` source sits
        // directly under src/.
        let mut main_source: Option<PathBuf> = None;
        if has_src_dir {
            for entry in fs::read_dir(&src_dir)
                .with_context(|| format!("failed to read `{}`", src_dir.display()))?
            {
                let path = entry?.path();
                if !source::is_source_file(&path) {
                    continue;
                }
                if path.file_stem().is_none_or(|stem| stem != "main") {
                    continue;
                }
                ensure!(main_source.is_none(), "multiple main sources were found");
                main_source = Some(path);
                self.has_binary_target = true;
            }
        }

        if !self.out_base_path.exists() {
            fs::create_dir_all(&self.out_base_path)
                .with_context(|| format!("failed to create `{}`", self.out_base_path.display()))?;
        }

        self.compile_units.clear();
        self.plan.reset();
        self.test_targets.clear();

        let opts = &self.project.compiler_opts;
        self.cxx_flags = join_display(&opts.c_flags.others);
        self.defines = join_display(&opts.c_flags.macros);
        self.includes = join_display(&opts.c_flags.include_dirs);
        let ld_others = join_display(&opts.ld_flags.others);
        let lib_dirs = join_display(&opts.ld_flags.lib_dirs);
        self.ld_flags = combine_flags(&[&ld_others, &lib_dirs]);
        self.libs = join_display(&opts.ld_flags.libs);

        let source_file_paths = if has_src_dir {
            source::list_source_file_paths(&src_dir)
        } else {
            Vec::new()
        };
        for path in &source_file_paths {
            if Some(path) != main_source.as_ref()
                && path.file_stem().is_some_and(|stem| stem == "main")
            {
                diag::warn(format!(
                    "source file `{}` is named `main` but is not located directly in the \
                     `src/` directory. This file will not be treated as the program's entry \
                     point. Move it directly to 'src/' if intended as such.",
                    path.display()
                ));
            }
        }

        let public_source_file_paths = if lib_dir.exists() {
            source::list_source_file_paths(&lib_dir)
        } else {
            Vec::new()
        };
        self.has_library_target = !public_source_file_paths.is_empty();

        if !self.has_binary_target && !self.has_library_target {
            bail!(
                "expected either `src/main` with a C++ source extension or at least one \
                 source file under `lib/`"
            );
        }

        let src_root = SourceRoot::new(src_dir, None);
        let lib_root = SourceRoot::new(lib_dir, Some(PathBuf::from("lib")));

        let src_obj_targets = self.process_sources(&source_file_paths, &src_root)?;
        self.src_object_targets = src_obj_targets.clone();
        self.src_object_targets
            .retain(|obj| !(obj == "main.o" || obj.ends_with("/main.o")));

        let lib_obj_targets = if public_source_file_paths.is_empty() {
            HashSet::new()
        } else {
            self.process_sources(&public_source_file_paths, &lib_root)?
        };

        let mut build_obj_targets = src_obj_targets;
        build_obj_targets.extend(lib_obj_targets.iter().cloned());

        if self.has_binary_target {
            let main_obj_path = self.project.build_out_path.join("main.o");
            let main_obj = paths::generic_string(
                main_obj_path
                    .strip_prefix(&self.out_base_path)
                    .context("internal error: build out dir escapes the out directory")?,
            );
            let main_unit = self
                .compile_units
                .get(&main_obj)
                .with_context(|| format!("internal error: missing compile unit for {main_obj}"))?;

            let mut closure = HashSet::from([main_obj.clone()]);
            let main_deps = main_unit.dependencies.clone();
            self.collect_bin_dep_objs(&mut closure, "", &main_deps, &build_obj_targets);

            let inputs = if self.has_library_target {
                // Objects owned by lib/ are linked through the archive, not
                // directly.
                closure.remove(&main_obj);
                let mut src_inputs: Vec<String> = closure
                    .into_iter()
                    .filter(|obj| !lib_obj_targets.contains(obj))
                    .collect();
                src_inputs.sort();

                let mut inputs = Vec::with_capacity(src_inputs.len() + 2);
                inputs.push(main_obj);
                inputs.extend(src_inputs);
                inputs.push(self.lib_name.clone());
                inputs
            } else {
                let mut inputs: Vec<String> = closure.into_iter().collect();
                inputs.sort();
                inputs
            };

            let package_name = self.project.manifest.package.name.clone();
            self.plan.add_edge(NinjaEdge {
                outputs: vec![package_name.clone()],
                rule: "cxx_link_exe".to_string(),
                inputs,
                implicit_inputs: Vec::new(),
                order_only_inputs: Vec::new(),
                bindings: vec![("out_dir".to_string(), parent_dir_or_dot(&package_name))],
            });
            self.plan.add_default_target(package_name);
        }

        if self.has_library_target {
            let mut library_inputs: Vec<String> = lib_obj_targets.iter().cloned().collect();
            ensure!(
                !library_inputs.is_empty(),
                "internal error: expected objects for library target"
            );
            library_inputs.sort();

            self.plan.add_edge(NinjaEdge {
                outputs: vec![self.lib_name.clone()],
                rule: "cxx_link_static_lib".to_string(),
                inputs: library_inputs,
                implicit_inputs: Vec::new(),
                order_only_inputs: Vec::new(),
                bindings: vec![("out_dir".to_string(), parent_dir_or_dot(&self.lib_name))],
            });
            self.plan.add_default_target(self.lib_name.clone());
        }

        if self.build_profile == BuildProfile::Test {
            let unit_candidates: Vec<&PathBuf> = source_file_paths
                .iter()
                .chain(public_source_file_paths.iter())
                .collect();
            let mut discovered = self.process_tests(&unit_candidates, false)?;

            let integration_test_dir = self.project.root_path.join("tests");
            if integration_test_dir.exists() {
                let integration_sources = source::list_source_file_paths(&integration_test_dir);
                let integration_candidates: Vec<&PathBuf> = integration_sources.iter().collect();
                discovered.extend(self.process_tests(&integration_candidates, true)?);
            }

            let mut test_targets: Vec<TestTarget> = discovered
                .into_iter()
                .map(|test| self.register_test_target(test))
                .collect();
            test_targets.sort_by(|a, b| a.ninja_target.cmp(&b.ninja_target));

            let names: Vec<String> = test_targets
                .iter()
                .map(|target| target.ninja_target.clone())
                .collect();
            self.test_targets = test_targets;
            self.plan.set_test_targets(names);
        } else {
            self.test_targets.clear();
            self.plan.set_test_targets(Vec::new());
        }

        Ok(())
    }

    pub fn write_build_files(&self) -> Result<()> {
        let toolchain = NinjaToolchain {
            cxx: self.compiler.cxx.clone(),
            cxx_flags: self.cxx_flags.clone(),
            defines: self.defines.clone(),
            includes: self.includes.clone(),
            ld_flags: self.ld_flags.clone(),
            libs: self.libs.clone(),
            archiver: self.archiver.clone(),
        };
        self.plan.write_files(&toolchain)
    }

    fn ninja_command(&self, for_dry_run: bool) -> Command {
        let mut ninja = Command::new("ninja");
        if !diag::is_verbose() && !for_dry_run {
            ninja.arg("--quiet");
        } else if diag::is_very_verbose() {
            ninja.arg("--verbose");
        }
        ninja.arg(format!("-j{}", parallel::parallelism()));
        ninja
    }

    /// Dry-run ninja over `targets`; anything but a clean "no work to do"
    /// means a build is required.
    pub fn needs_build(&self, targets: &[String]) -> Result<bool> {
        let mut cmd = self.ninja_command(true);
        cmd.arg("-C").arg(&self.out_base_path).arg("-n");
        cmd.args(targets);

        let output = command::capture(cmd)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let has_no_work = stdout.contains("ninja: no work to do.");
        Ok(!has_no_work || !output.status.success())
    }

    pub fn build_targets(&self, targets: &[String], display_name: &str) -> Result<ExitStatus> {
        if self.needs_build(targets)? {
            diag::status(
                "Compiling",
                format!(
                    "{} v{} ({})",
                    display_name,
                    self.project.manifest.package.version,
                    self.project.root_path.display()
                ),
            );
        }

        let mut cmd = self.ninja_command(false);
        cmd.arg("-C").arg(&self.out_base_path);
        cmd.args(targets);
        command::exec(cmd)
    }

    /// Merge `ninja -t compdb` output across every profile directory under
    /// `cabin-out/` into one `compile_commands.json`, keyed uniquely by
    /// `(directory, file)`.
    pub fn generate_compdb(&self) -> Result<()> {
        let out_root = self
            .out_base_path
            .parent()
            .context("out directory has no parent")?;

        let mut build_dirs = vec![self.out_base_path.clone()];
        if out_root.is_dir() {
            for entry in fs::read_dir(out_root)? {
                let path = entry?.path();
                if path.is_dir() && path.join(NINJA_FILE).exists() {
                    build_dirs.push(path);
                }
            }
        }
        build_dirs.sort();
        build_dirs.dedup();

        let mut entries: BTreeMap<(String, String), serde_json::Value> = BTreeMap::new();
        for build_dir in &build_dirs {
            if !build_dir.join(NINJA_FILE).exists() {
                continue;
            }

            let mut cmd = Command::new("ninja");
            cmd.arg("-C").arg(build_dir);
            cmd.arg("-t").arg("compdb").arg("cxx_compile");
            let stdout = command::capture_stdout(cmd)?;

            let json: serde_json::Value = serde_json::from_str(&stdout)
                .context("failed to parse ninja -t compdb output")?;
            let array = json.as_array().context("invalid compdb output")?;
            for entry in array {
                let directory = entry.get("directory").and_then(|v| v.as_str()).unwrap_or("");
                let file = entry.get("file").and_then(|v| v.as_str()).unwrap_or("");
                if !directory.is_empty() && !file.is_empty() {
                    entries.insert((directory.to_string(), file.to_string()), entry.clone());
                }
            }
        }

        let combined = serde_json::Value::Array(entries.into_values().collect());
        fs::create_dir_all(out_root)?;
        let compdb_path = out_root.join("compile_commands.json");
        fs::write(&compdb_path, format!("{}\n", serde_json::to_string_pretty(&combined)?))
            .with_context(|| format!("failed to write `{}`", compdb_path.display()))?;
        Ok(())
    }
}
