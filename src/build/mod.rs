//! Build orchestration.
//!
//! [`Builder`] drives one command invocation end to end: parse the
//! manifest, install dependencies, plan the ninja build, then build, test,
//! or run. Path dependencies reuse the same type recursively with their
//! diagnostics partially suppressed.

mod clean;
mod graph;
mod ninja;
mod project;
mod source;

pub use clean::clean;
pub use graph::{BuildGraph, TestKind, TestTarget};
pub use ninja::{NinjaEdge, NinjaPlan, NinjaToolchain};
pub use project::Project;
pub use source::{
    HEADER_FILE_EXTS, SOURCE_FILE_EXTS, SourceRoot, list_source_file_paths, parse_mm_output,
};

use crate::command;
use crate::diag;
use crate::manifest::{BuildProfile, Manifest};
use anyhow::{Context, Result, bail, ensure};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleOptions {
    pub include_dev_deps: bool,
    pub enable_coverage: bool,
    pub suppress_analysis_log: bool,
    pub suppress_finish_log: bool,
    pub suppress_dep_diag: bool,
}

pub struct Builder {
    base_path: PathBuf,
    build_profile: BuildProfile,
    options: ScheduleOptions,
    graph: Option<BuildGraph>,
    out_dir: PathBuf,
}

impl Builder {
    pub fn new(base_path: PathBuf, build_profile: BuildProfile) -> Builder {
        Builder {
            base_path,
            build_profile,
            options: ScheduleOptions::default(),
            graph: None,
            out_dir: PathBuf::new(),
        }
    }

    pub fn graph(&self) -> Result<&BuildGraph> {
        self.graph
            .as_ref()
            .context("builder.schedule() must be called first")
    }

    pub fn out_dir(&self) -> &PathBuf {
        &self.out_dir
    }

    /// Resolve the manifest, install dependencies, and emit the ninja plan
    /// (when stale) plus the aggregated compilation database.
    pub fn schedule(&mut self, options: ScheduleOptions) -> Result<()> {
        self.options = options;

        let manifest = Manifest::parse(&self.base_path.join(Manifest::FILE_NAME))?;
        if !options.suppress_analysis_log {
            diag::status("Analyzing", "project dependencies...");
        }

        let mut graph = BuildGraph::create(manifest, self.build_profile)?;
        graph.install_deps(options.include_dev_deps, options.suppress_dep_diag)?;
        if options.enable_coverage {
            graph.enable_coverage();
        }

        let stale = !graph.is_up_to_date(ninja::NINJA_FILE);
        diag::debug(format!(
            "build.ninja is {}up to date",
            if stale { "NOT " } else { "" }
        ));

        graph.configure()?;
        if stale {
            graph.write_build_files()?;
        }
        graph.generate_compdb()?;

        self.out_dir = graph.out_base_path().to_path_buf();
        self.graph = Some(graph);
        Ok(())
    }

    fn log_finished(&self, elapsed_secs: f64) -> Result<()> {
        if self.options.suppress_finish_log {
            return Ok(());
        }
        let graph = self.graph()?;
        let profile = graph.manifest().profile(self.build_profile)?;
        diag::status(
            "Finished",
            format!(
                "`{}` profile [{}] target(s) in {:.2}s",
                self.build_profile, profile, elapsed_secs
            ),
        );
        Ok(())
    }

    pub fn build(&mut self) -> Result<()> {
        let graph = self.graph()?;
        let start = Instant::now();

        let package_name = graph.manifest().package.name.clone();
        let mut status: Option<ExitStatus> = None;

        if graph.has_library_target() {
            let lib_status = graph.build_targets(
                &[graph.library_name().to_string()],
                &format!("{package_name}(lib)"),
            )?;
            status = Some(lib_status);
        }

        if status.is_none_or(|s| s.success()) && graph.has_binary_target() {
            status = Some(graph.build_targets(&[package_name.clone()], &package_name)?);
        }

        ensure!(status.is_none_or(|s| s.success()), "build failed");
        self.log_finished(start.elapsed().as_secs_f64())?;
        Ok(())
    }

    /// Build and execute the discovered test targets, honoring an optional
    /// substring filter on the ninja target name.
    pub fn test(&mut self, test_name: Option<&str>) -> Result<()> {
        let graph = self.graph()?;
        let package_name = graph.manifest().package.name.clone();
        let root_path = graph.manifest().root_dir()?.to_path_buf();

        let all_targets = graph.test_targets().to_vec();
        if all_targets.is_empty() {
            diag::warn("No test targets found");
            return Ok(());
        }

        let (kept, filtered_out): (Vec<TestTarget>, Vec<TestTarget>) =
            all_targets.into_iter().partition(|target| {
                test_name.is_none_or(|filter| target.ninja_target.contains(filter))
            });

        let build_start = Instant::now();
        if graph.has_library_target() {
            let status = graph.build_targets(
                &[graph.library_name().to_string()],
                &format!("{package_name}(lib)"),
            )?;
            ensure!(status.success(), "build failed");
        }
        if !kept.is_empty() {
            let names: Vec<String> = kept
                .iter()
                .map(|target| target.ninja_target.clone())
                .collect();
            let status = graph.build_targets(&names, &format!("{package_name}(test)"))?;
            ensure!(status.success(), "build failed");
        }
        self.log_finished(build_start.elapsed().as_secs_f64())?;

        let run_start = Instant::now();
        let mut num_passed: usize = 0;
        let mut num_failed: usize = 0;

        for target in &kept {
            let binary = self.out_dir.join(&target.ninja_target);
            let display_path = binary
                .strip_prefix(&root_path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| binary.display().to_string());
            diag::status(
                "Running",
                format!(
                    "{} test {} ({})",
                    target.kind.label(),
                    target.source_path,
                    display_path
                ),
            );

            let status = command::exec(Command::new(&binary))?;
            if status.success() {
                num_passed += 1;
            } else {
                num_failed += 1;
            }
        }

        let summary = format!(
            "{} passed; {} failed; {} filtered out; finished in {:.2}s",
            num_passed,
            num_failed,
            filtered_out.len(),
            run_start.elapsed().as_secs_f64()
        );
        if num_failed > 0 {
            bail!(summary);
        }
        diag::status("Ok", summary);
        Ok(())
    }

    /// Build the binary target and execute it with `args`.
    pub fn run(&mut self, args: &[String]) -> Result<()> {
        self.build()?;

        let graph = self.graph()?;
        let package_name = graph.manifest().package.name.clone();
        let root_path = graph.manifest().root_dir()?.to_path_buf();

        let rel_out = self
            .out_dir
            .strip_prefix(&root_path)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| self.out_dir.display().to_string());
        diag::status("Running", format!("`{rel_out}/{package_name}`"));

        let mut cmd = Command::new(self.out_dir.join(&package_name));
        cmd.args(args);
        command::exec_checked(cmd, "run")?;
        Ok(())
    }
}
