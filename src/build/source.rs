//! Source layout enumeration and the `-MM` output parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SOURCE_FILE_EXTS: [&str; 5] = ["c", "c++", "cc", "cpp", "cxx"];
pub const HEADER_FILE_EXTS: [&str; 5] = ["h", "h++", "hh", "hpp", "hxx"];

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_FILE_EXTS.contains(&ext))
}

pub fn is_header_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| HEADER_FILE_EXTS.contains(&ext))
}

/// Recursively enumerate source files under `dir`, sorted for stable build
/// graphs.
pub fn list_source_file_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| is_source_file(path))
        .collect();
    paths.sort();
    paths
}

/// A directory of sources plus the subdirectory its objects land in under
/// the build-out tree (`lib/` for public sources, none for `src/`).
#[derive(Debug, Clone)]
pub struct SourceRoot {
    pub directory: PathBuf,
    pub object_subdir: Option<PathBuf>,
}

impl SourceRoot {
    pub fn new(directory: PathBuf, object_subdir: Option<PathBuf>) -> SourceRoot {
        SourceRoot { directory, object_subdir }
    }
}

/// Parse the compiler's Make-style `-MM` output into the rule target and
/// the set of dependency paths. Line-continuation backslashes are
/// discarded, and the first dependency token (the source file itself) is
/// skipped.
pub fn parse_mm_output(mm_output: &str) -> (String, HashSet<String>) {
    let (target, rest) = match mm_output.split_once(':') {
        Some((target, rest)) => (target, rest),
        None => (mm_output, ""),
    };

    let mut deps = HashSet::new();
    let mut is_first = true;
    for token in rest.split(' ') {
        if token.is_empty() || token.starts_with('\\') {
            continue;
        }
        let token = token.strip_suffix('\n').unwrap_or(token);
        if token.is_empty() {
            continue;
        }
        if is_first {
            is_first = false;
            continue;
        }
        deps.insert(token.to_string());
    }
    (target.to_string(), deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_output_single_line() {
        let (target, deps) = parse_mm_output("main.o: src/main.cc include/a.hpp include/b.hpp\n");
        assert_eq!(target, "main.o");
        assert_eq!(deps.len(), 2);
        assert!(deps.contains("include/a.hpp"));
        assert!(deps.contains("include/b.hpp"));
    }

    #[test]
    fn mm_output_with_line_continuations() {
        let input = "main.o: src/main.cc include/foo.hpp include/bar.hpp \\\n include/baz.hh\n";
        let (target, deps) = parse_mm_output(input);
        assert_eq!(target, "main.o");
        assert!(deps.contains("include/foo.hpp"));
        assert!(deps.contains("include/bar.hpp"));
        assert!(deps.contains("include/baz.hh"));
        assert_eq!(deps.len(), 3);
    }

    #[test]
    fn mm_output_skips_the_source_itself() {
        let (_, deps) = parse_mm_output("foo.o: src/foo.cc\n");
        assert!(deps.is_empty());
    }

    #[test]
    fn source_extension_recognition() {
        for ext in SOURCE_FILE_EXTS {
            assert!(is_source_file(Path::new(&format!("a.{ext}"))), "{ext}");
        }
        assert!(!is_source_file(Path::new("a.hpp")));
        assert!(!is_source_file(Path::new("a.rs")));
        assert!(!is_source_file(Path::new("Makefile")));

        for ext in HEADER_FILE_EXTS {
            assert!(is_header_file(Path::new(&format!("a.{ext}"))), "{ext}");
        }
        assert!(!is_header_file(Path::new("a.cc")));
    }
}
