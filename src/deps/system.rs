//! System dependencies resolved through pkg-config.

use crate::compiler::CompilerOpts;
use anyhow::Result;
use semver::{Comparator, Op, VersionReq};

#[derive(Debug, Clone)]
pub struct SystemDependency {
    pub name: String,
    pub version_req: VersionReq,
}

fn comparator_version(comparator: &Comparator) -> String {
    let mut version = comparator.major.to_string();
    if let Some(minor) = comparator.minor {
        version.push('.');
        version.push_str(&minor.to_string());
        if let Some(patch) = comparator.patch {
            version.push('.');
            version.push_str(&patch.to_string());
        }
    }
    version
}

impl SystemDependency {
    /// Render the requirement as a comma-separated pkg-config constraint
    /// string. Caret, tilde, and wildcard requirements degrade to their
    /// `>=` lower bound.
    pub fn pkg_config_spec(&self) -> String {
        if self.version_req.comparators.is_empty() {
            return self.name.clone();
        }

        let mut parts = Vec::new();
        for comparator in &self.version_req.comparators {
            let op = match comparator.op {
                Op::Exact => "=",
                Op::Greater => ">",
                Op::GreaterEq => ">=",
                Op::Less => "<",
                Op::LessEq => "<=",
                _ => ">=",
            };
            parts.push(format!("{} {} {}", self.name, op, comparator_version(comparator)));
        }
        parts.join(", ")
    }

    pub fn install(&self) -> Result<CompilerOpts> {
        CompilerOpts::parse_pkg_config(&self.pkg_config_spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, req: &str) -> SystemDependency {
        SystemDependency {
            name: name.to_string(),
            version_req: VersionReq::parse(req).unwrap(),
        }
    }

    #[test]
    fn renders_comparison_operators() {
        assert_eq!(
            dep("zlib", ">=1.2, <2").pkg_config_spec(),
            "zlib >= 1.2, zlib < 2"
        );
        assert_eq!(dep("fmt", "=9.1.0").pkg_config_spec(), "fmt = 9.1.0");
    }

    #[test]
    fn caret_and_tilde_become_lower_bounds() {
        assert_eq!(dep("fmt", "1.2.3").pkg_config_spec(), "fmt >= 1.2.3");
        assert_eq!(dep("fmt", "~9.1").pkg_config_spec(), "fmt >= 9.1");
    }

    #[test]
    fn wildcard_matches_any_version() {
        assert_eq!(dep("fmt", "*").pkg_config_spec(), "fmt");
    }
}
