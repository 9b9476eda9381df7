//! Manifest (`cabin.toml`) parsing and validation.
//!
//! The raw TOML is deserialized into permissive serde structs, then
//! validated and resolved into the immutable [`Manifest`] model: package
//! identity, the three build profiles with their inheritance rules, and the
//! dependency tables dispatched into git/path/system variants.

use crate::deps::{Dependency, GitDependency, PathDependency, SystemDependency};
use crate::diag;
use anyhow::{Context, Result, bail, ensure};
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Characters allowed in a dependency name besides alphanumerics.
const DEP_NAME_CHARS: [char; 5] = ['-', '_', '/', '.', '+'];

/// Characters allowed in a compiler/linker flag besides alphanumerics.
const FLAG_CHARS: [char; 7] = ['-', '_', '=', '+', ':', '.', ','];

/// Reserved C++ keywords, banned as package names.
const CPP_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "atomic_cancel",
    "atomic_commit", "atomic_noexcept", "auto", "bitand", "bitor", "bool",
    "break", "case", "catch", "char", "char8_t", "char16_t", "char32_t",
    "class", "compl", "concept", "const", "consteval", "constexpr",
    "constinit", "const_cast", "continue", "co_await", "co_return",
    "co_yield", "decltype", "default", "delete", "do", "double",
    "dynamic_cast", "else", "enum", "explicit", "export", "extern", "false",
    "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "mutable", "namespace", "new", "noexcept", "not", "not_eq", "nullptr",
    "operator", "or", "or_eq", "private", "protected", "public", "reflexpr",
    "register", "reinterpret_cast", "requires", "return", "short", "signed",
    "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
    "synchronized", "template", "this", "thread_local", "throw", "true",
    "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
];

/// A C++ language-standard tag. Synonym spellings (`0x`, `1y`, ...) compare
/// equal to their year forms; ordering follows the year.
#[derive(Debug, Clone)]
pub struct Edition {
    pub year: u16,
    repr: String,
}

impl Edition {
    pub fn try_from_str(s: &str) -> Result<Edition> {
        let year = match s {
            "98" => 1998,
            "03" => 2003,
            "0x" | "11" => 2011,
            "1y" | "14" => 2014,
            "1z" | "17" => 2017,
            "2a" | "20" => 2020,
            "2b" | "23" => 2023,
            "2c" | "26" => 2026,
            _ => bail!("invalid edition"),
        };
        Ok(Edition { year, repr: s.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl PartialEq for Edition {
    fn eq(&self, other: &Self) -> bool {
        self.year == other.year
    }
}
impl Eq for Edition {}
impl PartialOrd for Edition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Edition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.year.cmp(&other.year)
    }
}
impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub edition: Edition,
    pub version: Version,
    pub authors: Vec<String>,
}

/// One of the three named build configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildProfile {
    Dev,
    Release,
    Test,
}

impl fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildProfile::Dev => f.write_str("dev"),
            BuildProfile::Release => f.write_str("release"),
            BuildProfile::Test => f.write_str("test"),
        }
    }
}

impl FromStr for BuildProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dev" => Ok(BuildProfile::Dev),
            "release" => Ok(BuildProfile::Release),
            "test" => Ok(BuildProfile::Test),
            _ => bail!("unknown profile: `{s}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub lto: bool,
    pub debug: bool,
    pub opt_level: u8,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = if self.opt_level == 0 { "unoptimized" } else { "optimized" };
        if self.debug {
            write!(f, "{opt} + debuginfo")
        } else {
            f.write_str(opt)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cpplint {
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Lint {
    pub cpplint: Cpplint,
}

#[derive(Debug)]
pub struct Manifest {
    pub path: PathBuf,
    pub package: Package,
    pub dependencies: Vec<Dependency>,
    pub dev_dependencies: Vec<Dependency>,
    pub profiles: HashMap<BuildProfile, Profile>,
    pub lint: Lint,
}

// Raw serde mirror of the TOML document. Optional everywhere; inheritance
// and validation happen after deserialization.

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: RawPackage,
    dependencies: Option<BTreeMap<String, toml::Value>>,
    #[serde(rename = "dev-dependencies")]
    dev_dependencies: Option<BTreeMap<String, toml::Value>>,
    profile: Option<RawProfileTable>,
    lint: Option<RawLint>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    edition: String,
    authors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawProfileTable {
    #[serde(flatten)]
    base: RawProfile,
    dev: Option<RawProfile>,
    release: Option<RawProfile>,
    test: Option<RawProfile>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RawProfile {
    cxxflags: Option<Vec<String>>,
    ldflags: Option<Vec<String>>,
    lto: Option<bool>,
    debug: Option<bool>,
    #[serde(rename = "opt-level")]
    opt_level: Option<u8>,
    #[serde(rename = "inherit-mode")]
    inherit_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLint {
    cpplint: Option<RawCpplint>,
}

#[derive(Debug, Deserialize)]
struct RawCpplint {
    filters: Option<Vec<String>>,
}

pub fn validate_package_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "package name must not be empty");
    ensure!(name.len() > 1, "package name must be more than one character");

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            bail!(
                "package name must only contain lowercase letters, numbers, \
                 dashes, and underscores"
            );
        }
    }

    let bytes = name.as_bytes();
    ensure!(
        bytes[0].is_ascii_alphabetic(),
        "package name must start with a letter"
    );
    ensure!(
        bytes[name.len() - 1].is_ascii_alphanumeric(),
        "package name must end with a letter or digit"
    );
    ensure!(
        !CPP_KEYWORDS.contains(&name),
        "package name must not be a C++ keyword"
    );
    Ok(())
}

/// Dependency names are looser than package names because pkg-config module
/// strings such as `gtkmm-4.0` or `ncurses++` flow through them.
pub fn validate_dep_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "dependency name must not be empty");
    let bytes = name.as_bytes();
    ensure!(
        bytes[0].is_ascii_alphanumeric(),
        "dependency name must start with an alphanumeric character"
    );
    ensure!(
        bytes[name.len() - 1].is_ascii_alphanumeric() || bytes[name.len() - 1] == b'+',
        "dependency name must end with an alphanumeric character or `+`"
    );

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && !DEP_NAME_CHARS.contains(&c) {
            bail!("dependency name must be alphanumeric, `-`, `_`, `/`, `.`, or `+`");
        }
    }

    for i in 1..bytes.len() {
        if bytes[i] == b'+' {
            // Consecutive `+` is the one allowed repetition (`ncurses++`).
            continue;
        }
        if !bytes[i].is_ascii_alphanumeric() && bytes[i] == bytes[i - 1] {
            bail!(
                "dependency name must not contain consecutive non-alphanumeric \
                 characters"
            );
        }
    }
    for i in 1..bytes.len().saturating_sub(1) {
        if bytes[i] != b'.' {
            continue;
        }
        if !bytes[i - 1].is_ascii_digit() || !bytes[i + 1].is_ascii_digit() {
            bail!("dependency name must contain `.` wrapped by digits");
        }
    }

    let slashes = bytes.iter().filter(|&&b| b == b'/').count();
    ensure!(slashes <= 1, "dependency name must not contain more than one `/`");

    let pluses = bytes.iter().filter(|&&b| b == b'+').count();
    ensure!(
        pluses == 0 || pluses == 2,
        "dependency name must contain zero or two `+`"
    );
    if pluses == 2 {
        let first = name.find('+').unwrap_or(0);
        let last = name.rfind('+').unwrap_or(0);
        ensure!(
            first + 1 == last,
            "`+` in the dependency name must be consecutive"
        );
    }
    Ok(())
}

fn validate_flag(ty: &str, flag: &str) -> Result<()> {
    ensure!(flag.starts_with('-'), "{ty} must start with `-`");

    // A single literal space is allowed once, for `-framework Metal`.
    let mut seen_space = false;
    for c in flag.chars() {
        if c == ' ' {
            ensure!(!seen_space, "{ty} must only contain ` ` once");
            seen_space = true;
            continue;
        }
        ensure!(
            c.is_ascii_alphanumeric() || FLAG_CHARS.contains(&c),
            "{ty} must only contain `-`, `_`, `=`, `+`, `:`, `.`, `,`, or \
             alphanumeric characters"
        );
    }
    Ok(())
}

fn validate_flags(ty: &str, flags: Vec<String>) -> Result<Vec<String>> {
    for flag in &flags {
        validate_flag(ty, flag)?;
    }
    Ok(flags)
}

fn validate_opt_level(opt_level: u8) -> Result<u8> {
    ensure!(opt_level <= 3, "opt-level must be between 0 and 3");
    Ok(opt_level)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InheritMode {
    Append,
    Overwrite,
}

fn parse_inherit_mode(mode: &str) -> Result<InheritMode> {
    match mode {
        "append" => Ok(InheritMode::Append),
        "overwrite" => Ok(InheritMode::Overwrite),
        _ => bail!("invalid inherit-mode: `{mode}`"),
    }
}

fn inherit_flags(mode: InheritMode, base: &[String], new_flags: Vec<String>) -> Vec<String> {
    if new_flags.is_empty() {
        return base.to_vec();
    }
    match mode {
        InheritMode::Append => base.iter().cloned().chain(new_flags).collect(),
        InheritMode::Overwrite => new_flags,
    }
}

fn resolved_flags(
    ty: &str,
    own: &Option<Vec<String>>,
    base: &Option<Vec<String>>,
) -> Result<Vec<String>> {
    let flags = own.clone().or_else(|| base.clone()).unwrap_or_default();
    validate_flags(ty, flags)
}

fn resolve_profiles(raw: &RawProfileTable) -> Result<HashMap<BuildProfile, Profile>> {
    let base = &raw.base;
    let empty = RawProfile::default();
    let dev_raw = raw.dev.as_ref().unwrap_or(&empty);
    let release_raw = raw.release.as_ref().unwrap_or(&empty);
    let test_raw = raw.test.as_ref().unwrap_or(&empty);

    let dev = Profile {
        cxxflags: resolved_flags("cxxflags", &dev_raw.cxxflags, &base.cxxflags)?,
        ldflags: resolved_flags("ldflags", &dev_raw.ldflags, &base.ldflags)?,
        lto: dev_raw.lto.or(base.lto).unwrap_or(false),
        debug: dev_raw.debug.or(base.debug).unwrap_or(true),
        opt_level: validate_opt_level(dev_raw.opt_level.or(base.opt_level).unwrap_or(0))?,
    };
    let release = Profile {
        cxxflags: resolved_flags("cxxflags", &release_raw.cxxflags, &base.cxxflags)?,
        ldflags: resolved_flags("ldflags", &release_raw.ldflags, &base.ldflags)?,
        lto: release_raw.lto.or(base.lto).unwrap_or(false),
        debug: release_raw.debug.or(base.debug).unwrap_or(false),
        opt_level: validate_opt_level(release_raw.opt_level.or(base.opt_level).unwrap_or(3))?,
    };

    // The test profile inherits from the resolved dev profile.
    let mode = parse_inherit_mode(test_raw.inherit_mode.as_deref().unwrap_or("append"))?;
    let test = Profile {
        cxxflags: inherit_flags(
            mode,
            &dev.cxxflags,
            validate_flags("cxxflags", test_raw.cxxflags.clone().unwrap_or_default())?,
        ),
        ldflags: inherit_flags(
            mode,
            &dev.ldflags,
            validate_flags("ldflags", test_raw.ldflags.clone().unwrap_or_default())?,
        ),
        lto: test_raw.lto.unwrap_or(dev.lto),
        debug: test_raw.debug.unwrap_or(dev.debug),
        opt_level: validate_opt_level(test_raw.opt_level.unwrap_or(dev.opt_level))?,
    };

    Ok(HashMap::from([
        (BuildProfile::Dev, dev),
        (BuildProfile::Release, release),
        (BuildProfile::Test, test),
    ]))
}

fn parse_git_dep(name: &str, info: &toml::Table) -> Result<GitDependency> {
    validate_dep_name(name)?;
    let url = info
        .get("git")
        .and_then(toml::Value::as_str)
        .context("git dependency URL must be a string")?;

    // rev, tag, or branch; the first one present wins.
    let mut target = None;
    for key in ["rev", "tag", "branch"] {
        if let Some(value) = info.get(key).and_then(toml::Value::as_str) {
            target = Some(value.to_string());
            break;
        }
    }
    Ok(GitDependency {
        name: name.to_string(),
        url: url.to_string(),
        target,
    })
}

fn parse_path_dep(name: &str, info: &toml::Table) -> Result<PathDependency> {
    validate_dep_name(name)?;
    let path = info
        .get("path")
        .and_then(toml::Value::as_str)
        .context("path dependency must be a string")?;
    Ok(PathDependency {
        name: name.to_string(),
        path: PathBuf::from(path),
    })
}

fn parse_system_dep(name: &str, info: &toml::Table) -> Result<SystemDependency> {
    validate_dep_name(name)?;
    let version = info
        .get("version")
        .and_then(toml::Value::as_str)
        .context("system dependency requires a `version` string")?;
    let version_req = VersionReq::parse(version)
        .with_context(|| format!("invalid version requirement: `{version}`"))?;
    Ok(SystemDependency {
        name: name.to_string(),
        version_req,
    })
}

fn parse_dependencies(table: Option<&BTreeMap<String, toml::Value>>) -> Result<Vec<Dependency>> {
    let Some(table) = table else {
        return Ok(Vec::new());
    };

    let mut deps = Vec::new();
    for (name, value) in table {
        let Some(info) = value.as_table() else {
            bail!("dependency `{name}` must be a table");
        };
        if info.contains_key("git") {
            deps.push(Dependency::Git(parse_git_dep(name, info)?));
        } else if info.get("system").and_then(toml::Value::as_bool).unwrap_or(false) {
            deps.push(Dependency::System(parse_system_dep(name, info)?));
        } else if info.contains_key("path") {
            deps.push(Dependency::Path(parse_path_dep(name, info)?));
        } else {
            bail!("only git, path, and system dependencies are supported: `{name}`");
        }
    }
    Ok(deps)
}

impl Manifest {
    pub const FILE_NAME: &'static str = "cabin.toml";

    /// Walk upward from `start_dir` looking for `cabin.toml`, stopping at
    /// the filesystem root.
    pub fn find_path(start_dir: &Path) -> Result<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(Self::FILE_NAME);
            diag::trace(format!("finding manifest: {}", candidate.display()));
            if candidate.exists() {
                return Ok(candidate);
            }
            if !dir.pop() {
                break;
            }
        }
        bail!(
            "could not find `{}` in `{}` or its parents",
            Self::FILE_NAME,
            start_dir.display()
        );
    }

    pub fn parse(path: &Path) -> Result<Manifest> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::from_toml(&content, path.to_path_buf())
    }

    pub fn from_toml(content: &str, path: PathBuf) -> Result<Manifest> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;

        validate_package_name(&raw.package.name)?;
        let edition = Edition::try_from_str(&raw.package.edition)?;
        let version = Version::parse(&raw.package.version)
            .with_context(|| format!("invalid semver: `{}`", raw.package.version))?;
        let package = Package {
            name: raw.package.name,
            edition,
            version,
            authors: raw.package.authors.unwrap_or_default(),
        };

        let dependencies = parse_dependencies(raw.dependencies.as_ref())?;
        let dev_dependencies = parse_dependencies(raw.dev_dependencies.as_ref())?;
        let profiles = resolve_profiles(&raw.profile.unwrap_or_default())?;

        let lint = Lint {
            cpplint: Cpplint {
                filters: raw
                    .lint
                    .and_then(|l| l.cpplint)
                    .and_then(|c| c.filters)
                    .unwrap_or_default(),
            },
        };

        Ok(Manifest {
            path,
            package,
            dependencies,
            dev_dependencies,
            profiles,
            lint,
        })
    }

    pub fn root_dir(&self) -> Result<&Path> {
        self.path
            .parent()
            .context("manifest path has no parent directory")
    }

    pub fn profile(&self, build_profile: BuildProfile) -> Result<&Profile> {
        self.profiles
            .get(&build_profile)
            .with_context(|| format!("internal error: missing `{build_profile}` profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_manifest(content: &str) -> Result<Manifest> {
        Manifest::from_toml(content, PathBuf::from("/tmp/proj/cabin.toml"))
    }

    #[derive(Deserialize, Default)]
    struct ProfileDoc {
        profile: Option<RawProfileTable>,
    }

    fn profile_table(content: &str) -> RawProfileTable {
        let doc: ProfileDoc = toml::from_str(content).unwrap();
        doc.profile.unwrap_or_default()
    }

    fn profiles_of(content: &str) -> HashMap<BuildProfile, Profile> {
        resolve_profiles(&profile_table(content)).unwrap()
    }

    const PKG_HEADER: &str = "[package]\nname = \"app\"\nversion = \"0.1.0\"\nedition = \"20\"\n";

    #[test]
    fn edition_from_str_accepts_years_and_synonyms() {
        for (s, year) in [
            ("98", 1998),
            ("03", 2003),
            ("0x", 2011),
            ("11", 2011),
            ("1y", 2014),
            ("14", 2014),
            ("1z", 2017),
            ("17", 2017),
            ("2a", 2020),
            ("20", 2020),
            ("2b", 2023),
            ("23", 2023),
            ("2c", 2026),
            ("26", 2026),
        ] {
            assert_eq!(Edition::try_from_str(s).unwrap().year, year, "{s}");
        }

        for s in ["", "abc", "99", "21"] {
            assert_eq!(
                Edition::try_from_str(s).unwrap_err().to_string(),
                "invalid edition"
            );
        }
    }

    #[test]
    fn edition_ordering_follows_years() {
        let e = |s| Edition::try_from_str(s).unwrap();
        assert!(e("98") < e("03"));
        assert!(e("03") < e("11"));
        assert!(e("11") < e("14"));
        assert!(e("14") < e("17"));
        assert!(e("17") < e("20"));
        assert!(e("20") < e("23"));
        assert!(e("23") < e("2c"));
        assert!(e("2c") >= e("23"));
    }

    #[test]
    fn edition_synonyms_compare_equal() {
        let e = |s| Edition::try_from_str(s).unwrap();
        assert_eq!(e("11"), e("0x"));
        assert_eq!(e("14"), e("1y"));
        assert_eq!(e("17"), e("1z"));
        assert_eq!(e("20"), e("2a"));
        assert_eq!(e("23"), e("2b"));
        assert_ne!(e("11"), e("03"));
    }

    #[test]
    fn package_parses_from_toml() {
        let manifest = parse_manifest(
            "[package]\nname = \"test-pkg\"\nversion = \"1.2.3\"\nedition = \"20\"\n",
        )
        .unwrap();
        assert_eq!(manifest.package.name, "test-pkg");
        assert_eq!(manifest.package.edition.as_str(), "20");
        assert_eq!(manifest.package.version.to_string(), "1.2.3");
    }

    #[test]
    fn package_rejects_invalid_fields() {
        let err = parse_manifest(
            "[package]\nname = \"test-pkg\"\nversion = \"1.2.3\"\nedition = \"invalid\"\n",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid edition");

        let err = parse_manifest(
            "[package]\nname = \"test-pkg\"\nversion = \"invalid\"\nedition = \"20\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid semver"));

        assert!(parse_manifest("[package]\nname = \"test-pkg\"\n").is_err());
    }

    #[test]
    fn profiles_have_sensible_defaults() {
        let dev_default = Profile {
            cxxflags: vec![],
            ldflags: vec![],
            lto: false,
            debug: true,
            opt_level: 0,
        };
        let release_default = Profile {
            cxxflags: vec![],
            ldflags: vec![],
            lto: false,
            debug: false,
            opt_level: 3,
        };

        for content in ["", "[profile]\n"] {
            let profiles = profiles_of(content);
            assert_eq!(profiles[&BuildProfile::Dev], dev_default);
            assert_eq!(profiles[&BuildProfile::Release], release_default);
            assert_eq!(profiles[&BuildProfile::Test], dev_default);
        }
    }

    #[test]
    fn base_profile_applies_to_all() {
        let profiles = profiles_of(
            "[profile]\ncxxflags = [\"-fno-rtti\"]\nldflags = [\"-lm\"]\n\
             lto = true\ndebug = true\nopt-level = 2\n",
        );
        let expected = Profile {
            cxxflags: vec!["-fno-rtti".into()],
            ldflags: vec!["-lm".into()],
            lto: true,
            debug: true,
            opt_level: 2,
        };
        assert_eq!(profiles[&BuildProfile::Dev], expected);
        assert_eq!(profiles[&BuildProfile::Release], expected);
        assert_eq!(profiles[&BuildProfile::Test], expected);
    }

    #[test]
    fn empty_flag_lists_override_the_base() {
        let profiles = profiles_of(
            "[profile]\ncxxflags = [\"-fno-rtti\"]\n\n[profile.dev]\ncxxflags = []\n\
             \n[profile.release]\ncxxflags = []\n",
        );
        assert!(profiles[&BuildProfile::Dev].cxxflags.is_empty());
        assert!(profiles[&BuildProfile::Release].cxxflags.is_empty());
        assert!(profiles[&BuildProfile::Test].cxxflags.is_empty());
    }

    #[test]
    fn opt_level_falls_back_per_profile() {
        let profiles = profiles_of(
            "[profile]\nopt-level = 2\n\n[profile.dev]\nopt-level = 1\n\
             \n[profile.test]\nopt-level = 3\n",
        );
        assert_eq!(profiles[&BuildProfile::Dev].opt_level, 1);
        assert_eq!(profiles[&BuildProfile::Release].opt_level, 2);
        assert_eq!(profiles[&BuildProfile::Test].opt_level, 3);
    }

    #[test]
    fn test_profile_appends_to_dev_by_default() {
        let profiles = profiles_of(
            "[profile.dev]\ncxxflags = [\"-A\"]\n\n[profile.test]\ncxxflags = [\"-B\"]\n",
        );
        assert_eq!(profiles[&BuildProfile::Dev].cxxflags, vec!["-A"]);
        assert_eq!(profiles[&BuildProfile::Test].cxxflags, vec!["-A", "-B"]);
        assert!(profiles[&BuildProfile::Release].cxxflags.is_empty());
    }

    #[test]
    fn test_profile_overwrite_mode_replaces_dev_flags() {
        let profiles = profiles_of(
            "[profile.dev]\ncxxflags = [\"-A\"]\n\n[profile.test]\n\
             inherit-mode = \"overwrite\"\ncxxflags = [\"-B\"]\n",
        );
        assert_eq!(profiles[&BuildProfile::Dev].cxxflags, vec!["-A"]);
        assert_eq!(profiles[&BuildProfile::Test].cxxflags, vec!["-B"]);
    }

    #[test]
    fn invalid_inherit_mode_is_rejected() {
        let table = profile_table("[profile.test]\ninherit-mode = \"UNKNOWN\"\n");
        let err = resolve_profiles(&table).unwrap_err();
        assert_eq!(err.to_string(), "invalid inherit-mode: `UNKNOWN`");
    }

    #[test]
    fn opt_level_out_of_range_is_rejected() {
        let table = profile_table("[profile]\nopt-level = 4\n");
        let err = resolve_profiles(&table).unwrap_err();
        assert_eq!(err.to_string(), "opt-level must be between 0 and 3");
    }

    #[test]
    fn dep_name_accepts_pkg_config_style_names() {
        for name in ["gtkmm-4.0", "ncurses++", "a/b", "1.1.1", "1.1", "1-1-1", "fmt"] {
            assert!(validate_dep_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn dep_name_rejects_malformed_names() {
        let cases = [
            ("", "dependency name must not be empty"),
            ("-", "dependency name must start with an alphanumeric character"),
            ("1-", "dependency name must end with an alphanumeric character or `+`"),
            (
                "1--1",
                "dependency name must not contain consecutive non-alphanumeric characters",
            ),
            ("a.a", "dependency name must contain `.` wrapped by digits"),
            ("a/b/c", "dependency name must not contain more than one `/`"),
            ("a+", "dependency name must contain zero or two `+`"),
            ("a+++", "dependency name must contain zero or two `+`"),
            ("a+b+c", "`+` in the dependency name must be consecutive"),
        ];
        for (name, msg) in cases {
            assert_eq!(validate_dep_name(name).unwrap_err().to_string(), msg, "{name}");
        }
    }

    #[test]
    fn dep_name_rejects_unusual_characters() {
        for c in ['!', '#', '%', '~', ' ', '@'] {
            assert_eq!(
                validate_dep_name(&format!("1{c}1")).unwrap_err().to_string(),
                "dependency name must be alphanumeric, `-`, `_`, `/`, `.`, or `+`"
            );
        }
    }

    #[test]
    fn flag_validation_allows_one_space() {
        assert!(validate_flag("cxxflags", "-fsanitize=address,undefined").is_ok());
        assert!(validate_flag("ldflags", "-framework Metal").is_ok());
        assert_eq!(
            validate_flag("ldflags", "-framework  Metal").unwrap_err().to_string(),
            "ldflags must only contain ` ` once"
        );
        assert_eq!(
            validate_flag("ldflags", "-framework Metal && bash")
                .unwrap_err()
                .to_string(),
            "ldflags must only contain ` ` once"
        );
        assert!(validate_flag("cxxflags", "W4").is_err());
    }

    #[test]
    fn package_name_validation() {
        assert!(validate_package_name("hello").is_ok());
        assert!(validate_package_name("hello-world2").is_ok());
        assert!(validate_package_name("x").is_err());
        assert!(validate_package_name("Hello").is_err());
        assert!(validate_package_name("1hello").is_err());
        assert!(validate_package_name("hello-").is_err());
        assert_eq!(
            validate_package_name("class").unwrap_err().to_string(),
            "package name must not be a C++ keyword"
        );
    }

    #[test]
    fn dependency_tables_dispatch_by_shape() {
        let manifest = parse_manifest(&format!(
            "{PKG_HEADER}\n[dependencies]\n\
             fmt = {{git = \"https://github.com/fmtlib/fmt\", tag = \"11.0.2\"}}\n\
             widget = {{path = \"../widget\"}}\n\
             zlib = {{system = true, version = \">=1.2\"}}\n"
        ))
        .unwrap();

        assert_eq!(manifest.dependencies.len(), 3);
        match &manifest.dependencies[0] {
            Dependency::Git(dep) => {
                assert_eq!(dep.name, "fmt");
                assert_eq!(dep.url, "https://github.com/fmtlib/fmt");
                assert_eq!(dep.target.as_deref(), Some("11.0.2"));
            }
            other => panic!("expected git dependency, got {other:?}"),
        }
        match &manifest.dependencies[1] {
            Dependency::Path(dep) => assert_eq!(dep.path, PathBuf::from("../widget")),
            other => panic!("expected path dependency, got {other:?}"),
        }
        match &manifest.dependencies[2] {
            Dependency::System(dep) => assert_eq!(dep.name, "zlib"),
            other => panic!("expected system dependency, got {other:?}"),
        }
    }

    #[test]
    fn git_dep_prefers_rev_over_tag_and_branch() {
        let manifest = parse_manifest(&format!(
            "{PKG_HEADER}\n[dependencies]\n\
             fmt = {{git = \"https://github.com/fmtlib/fmt\", branch = \"master\", \
             rev = \"abc123\"}}\n"
        ))
        .unwrap();
        match &manifest.dependencies[0] {
            Dependency::Git(dep) => assert_eq!(dep.target.as_deref(), Some("abc123")),
            other => panic!("expected git dependency, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_shape_is_rejected() {
        let err = parse_manifest(&format!(
            "{PKG_HEADER}\n[dependencies]\nfmt = {{version = \"1.0\"}}\n"
        ))
        .unwrap_err();
        assert!(err.to_string().contains("only git, path, and system dependencies"));

        let err = parse_manifest(&format!(
            "{PKG_HEADER}\n[dependencies]\nzlib = {{system = true}}\n"
        ))
        .unwrap_err();
        assert!(err.to_string().contains("`version`"));
    }

    #[test]
    fn lint_filters_parse() {
        let manifest = parse_manifest(&format!(
            "{PKG_HEADER}\n[lint.cpplint]\nfilters = [\"+filter1\", \"-filter2\"]\n"
        ))
        .unwrap();
        assert_eq!(manifest.lint.cpplint.filters, vec!["+filter1", "-filter2"]);

        let manifest = parse_manifest(PKG_HEADER).unwrap();
        assert!(manifest.lint.cpplint.filters.is_empty());
    }

    #[test]
    fn profile_display_matches_cargo_phrasing() {
        let profiles = profiles_of("");
        assert_eq!(
            profiles[&BuildProfile::Dev].to_string(),
            "unoptimized + debuginfo"
        );
        assert_eq!(profiles[&BuildProfile::Release].to_string(), "optimized");
    }
}
