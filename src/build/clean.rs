//! Removal of build artifacts.

use crate::diag;
use crate::manifest::{BuildProfile, Manifest};
use anyhow::{Context, Result};
use std::env;
use std::fs;

/// Remove `cabin-out/`, or a single profile subtree when `profile` is
/// given.
pub fn clean(profile: Option<&str>) -> Result<()> {
    let cwd = env::current_dir().context("failed to determine the current directory")?;
    let manifest_path = Manifest::find_path(&cwd)?;
    let mut out_dir = manifest_path
        .parent()
        .context("manifest path has no parent directory")?
        .join("cabin-out");

    if let Some(profile) = profile {
        let build_profile: BuildProfile = profile.parse()?;
        out_dir.push(build_profile.to_string());
    }

    if out_dir.exists() {
        let display = out_dir.canonicalize().unwrap_or_else(|_| out_dir.clone());
        diag::status("Removing", display.display());
        fs::remove_dir_all(&out_dir)
            .with_context(|| format!("failed to remove `{}`", out_dir.display()))?;
    }
    Ok(())
}
