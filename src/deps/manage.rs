//! Manifest dependency editing.

use crate::diag;
use crate::manifest::Manifest;
use anyhow::{Context, Result, ensure};
use std::env;
use std::fs;
use toml_edit::DocumentMut;

/// Remove dependencies from `[dependencies]` in the manifest, preserving the
/// file's formatting. Names that are not present produce a warning; the file
/// is only rewritten when something was removed.
pub fn remove_dependencies(deps: &[String]) -> Result<()> {
    let cwd = env::current_dir().context("failed to determine the current directory")?;
    let manifest_path = Manifest::find_path(&cwd)?;

    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read `{}`", manifest_path.display()))?;
    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse `{}`", manifest_path.display()))?;

    let has_deps = doc
        .get("dependencies")
        .and_then(|item| item.as_table())
        .is_some_and(|table| !table.is_empty());
    ensure!(has_deps, "No dependencies to remove");

    let mut removed = Vec::new();
    for dep in deps {
        let table = doc
            .get_mut("dependencies")
            .and_then(|item| item.as_table_mut());
        let found = table.is_some_and(|table| table.remove(dep).is_some());
        if found {
            removed.push(dep.clone());
        } else {
            diag::warn(format!(
                "Dependency `{}` not found in {}",
                dep,
                manifest_path.display()
            ));
        }
    }

    if !removed.is_empty() {
        fs::write(&manifest_path, doc.to_string())
            .with_context(|| format!("failed to write `{}`", manifest_path.display()))?;
        diag::status(
            "Removed",
            format!("{} from {}", removed.join(", "), manifest_path.display()),
        );
    }
    Ok(())
}
