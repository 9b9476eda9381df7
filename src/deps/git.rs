//! Git dependency installation.
//!
//! Clones live in a per-user cache directory addressed by the dependency
//! name plus its sanitized URL (and pinned target), so two projects pinning
//! the same repository differently never share a checkout.

use crate::compiler::{CompilerOpts, IncludeDir};
use crate::deps::resolve_include_dir;
use anyhow::{Context, Result, bail};
use git2::build::CheckoutBuilder;
use git2::{BranchType, ObjectType, Oid, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GitDependency {
    pub name: String,
    pub url: String,
    /// A rev, tag, or branch to pin the checkout to.
    pub target: Option<String>,
}

fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}

fn clone_with_spinner(name: &str, url: &str, install_dir: &Path) -> Result<Repository> {
    if let Some(parent) = install_dir.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Downloading {name}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = Repository::clone(url, install_dir);
    spinner.finish_and_clear();

    match result {
        Ok(repo) => Ok(repo),
        Err(err) => {
            // Leave no half-cloned directory behind.
            let _ = fs::remove_dir_all(install_dir);
            Err(err).with_context(|| format!("failed to clone {url}"))
        }
    }
}

fn resolve_target<'repo>(repo: &'repo Repository, target: &str) -> Result<git2::Object<'repo>> {
    if let Ok(oid) = Oid::from_str(target) {
        if let Ok(object) = repo.find_object(oid, None) {
            return Ok(object);
        }
    }
    if let Ok(reference) = repo.find_reference(&format!("refs/tags/{target}")) {
        if let Ok(object) = reference.peel(ObjectType::Commit) {
            return Ok(object);
        }
    }
    if let Ok(branch) = repo.find_branch(target, BranchType::Local) {
        if let Ok(commit) = branch.get().peel_to_commit() {
            return Ok(commit.into_object());
        }
    }
    if let Ok(branch) = repo.find_branch(&format!("origin/{target}"), BranchType::Remote) {
        if let Ok(commit) = branch.get().peel_to_commit() {
            return Ok(commit.into_object());
        }
    }
    bail!("no rev, tag, or branch named `{target}` found");
}

fn checkout_target(repo: &Repository, target: &str) -> Result<()> {
    let object = resolve_target(repo, target)?;
    repo.set_head_detached(object.id())?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(&object, Some(&mut checkout))?;
    Ok(())
}

impl GitDependency {
    /// The content-addressed install directory for this dependency.
    pub fn install_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().context("could not determine the user cache directory")?;
        let mut key = sanitize_component(&self.url);
        if let Some(target) = &self.target {
            key.push('-');
            key.push_str(&sanitize_component(target));
        }
        Ok(cache_dir
            .join("cabin")
            .join("git")
            .join(format!("{}-{}", self.name, key)))
    }

    pub fn install(&self) -> Result<CompilerOpts> {
        let install_dir = self.install_dir()?;
        let repo = if install_dir.exists() {
            Repository::open(&install_dir)
                .with_context(|| format!("failed to open cached clone of {}", self.url))?
        } else {
            clone_with_spinner(&self.name, &self.url, &install_dir)?
        };

        if let Some(target) = &self.target {
            checkout_target(&repo, target)
                .with_context(|| format!("failed to check out `{target}` of {}", self.url))?;
        }

        let mut opts = CompilerOpts::default();
        opts.c_flags
            .include_dirs
            .push(IncludeDir::new(resolve_include_dir(&install_dir), false));
        Ok(opts)
    }
}
