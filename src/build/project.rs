//! Per-invocation project state: the output tree layout and the compiler
//! options derived from the selected profile.

use crate::compiler::{CompilerOpts, IncludeDir};
use crate::manifest::{BuildProfile, Manifest};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Project {
    pub root_path: PathBuf,
    pub out_base_path: PathBuf,
    pub build_out_path: PathBuf,
    pub unittest_out_path: PathBuf,
    pub integration_test_out_path: PathBuf,
    pub manifest: Manifest,
    pub compiler_opts: CompilerOpts,
}

impl Project {
    pub fn init(build_profile: BuildProfile, manifest: Manifest) -> Result<Project> {
        let root_path = manifest.root_dir()?.to_path_buf();
        let out_base_path = root_path.join("cabin-out").join(build_profile.to_string());
        let build_out_path = out_base_path.join(format!("{}.d", manifest.package.name));
        let unittest_out_path = out_base_path.join("unit");
        let integration_test_out_path = out_base_path.join("intg");

        let profile = manifest.profile(build_profile)?;
        let mut opts = CompilerOpts::default();
        opts.c_flags
            .others
            .push(format!("-std=c++{}", manifest.package.edition));
        if profile.debug {
            opts.c_flags.others.push("-g".to_string());
        }
        opts.c_flags.others.push(format!("-O{}", profile.opt_level));
        if profile.lto {
            opts.c_flags.others.push("-flto".to_string());
        }
        opts.c_flags.others.extend(profile.cxxflags.iter().cloned());
        opts.ld_flags.others.extend(profile.ldflags.iter().cloned());

        let include_dir = root_path.join("include");
        if include_dir.is_dir() {
            opts.c_flags.include_dirs.push(IncludeDir::new(include_dir, false));
        }

        Ok(Project {
            root_path,
            out_base_path,
            build_out_path,
            unittest_out_path,
            integration_test_out_path,
            manifest,
            compiler_opts: opts,
        })
    }
}
