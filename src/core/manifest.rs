//! project.toml manifest parsing and schema.
//!
//! Loading is TOML parse, then shape validation, then typed construction.
//! The typed `Manifest` is immutable for the rest of the run; mutations
//! (`target add`, export re-folds) go through the byte-minimal patch layer
//! in `ops`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::Deserialize;

use crate::core::component::Reference;
use crate::core::dependency::{Dependency, DependencySpec};
use crate::core::errors::Error;
use crate::core::target::{Target, TargetKind};

/// A `[[src]]` entry: one component file belonging to the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcEntry {
    pub name: String,

    /// Component file path, relative to the manifest directory
    pub path: PathBuf,

    /// Binary sidecar path, relative to the manifest directory
    pub binary: Option<PathBuf>,
}

impl SrcEntry {
    /// Absolute path of the component file.
    pub fn resolved_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.path)
    }

    /// Absolute path of the binary sidecar, if declared.
    pub fn resolved_binary(&self, dir: &Path) -> Option<PathBuf> {
        self.binary.as_ref().map(|b| dir.join(b))
    }
}

/// The parsed project.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: String,
    pub version: Version,
    pub authors: Vec<String>,

    /// Selector applied when the project has several targets
    pub default_target: Option<String>,

    pub dependencies: Vec<Dependency>,
    pub src: Vec<SrcEntry>,
    pub targets: Vec<Target>,
    pub references: Vec<Reference>,

    /// Workspace member directories (absolute)
    pub members: Vec<PathBuf>,

    /// The directory containing this manifest
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: Option<RawPackage>,

    #[serde(default)]
    dependencies: HashMap<String, DependencySpec>,

    #[serde(default)]
    src: Vec<RawSrc>,

    #[serde(default)]
    targets: Vec<RawTarget>,

    #[serde(default)]
    references: Vec<Reference>,

    #[serde(default)]
    workspace: Option<RawWorkspace>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,

    #[serde(default)]
    authors: Vec<String>,

    #[serde(default, rename = "default-target")]
    default_target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSrc {
    name: String,
    path: PathBuf,

    #[serde(default)]
    binary: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    path: Option<PathBuf>,

    #[serde(default)]
    blank: bool,
}

#[derive(Debug, Deserialize)]
struct RawWorkspace {
    #[serde(default)]
    members: Vec<PathBuf>,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("static pattern"))
}

impl Manifest {
    pub const FILENAME: &'static str = "project.toml";

    /// Load the manifest from a project directory.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(Self::FILENAME);
        if !path.exists() {
            return Err(Error::ManifestNotFound {
                path: dir.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::ManifestInvalid {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Self::parse(&content, &path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, Error> {
        let invalid = |message: String| Error::ManifestInvalid {
            path: path.to_path_buf(),
            message,
        };

        let raw: RawManifest =
            toml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let package = raw
            .package
            .ok_or_else(|| invalid("missing [package] section".to_string()))?;

        if !name_pattern().is_match(&package.name) {
            return Err(invalid(format!(
                "package name `{}` must be lowercase kebab-case",
                package.name
            )));
        }

        let version: Version = package
            .version
            .parse()
            .map_err(|e| invalid(format!("invalid version `{}`: {}", package.version, e)))?;

        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        // Dependencies, sorted by name for deterministic downstream order
        let mut dependencies = raw
            .dependencies
            .iter()
            .map(|(name, spec)| spec.to_dependency(name, &dir))
            .collect::<Result<Vec<_>, _>>()?;
        dependencies.sort_by(|a, b| a.name().cmp(b.name()));

        // Src entries, names unique
        let mut src = Vec::with_capacity(raw.src.len());
        let mut seen = std::collections::HashSet::new();
        for entry in raw.src {
            if !seen.insert(entry.name.clone()) {
                return Err(invalid(format!("duplicate src entry `{}`", entry.name)));
            }
            src.push(SrcEntry {
                name: entry.name,
                path: entry.path,
                binary: entry.binary,
            });
        }

        // Targets
        let mut targets = Vec::with_capacity(raw.targets.len());
        for raw_target in raw.targets {
            let kind: TargetKind = raw_target
                .kind
                .parse()
                .map_err(|_| invalid(format!("unknown target type `{}`", raw_target.kind)))?;
            let name = raw_target.name.unwrap_or_else(|| package.name.clone());
            let target_path = raw_target.path.unwrap_or_else(|| PathBuf::from("build"));
            targets.push(Target::new(kind, name, target_path, raw_target.blank));
        }

        // Reference GUIDs unique
        let mut guids = std::collections::HashSet::new();
        for reference in &raw.references {
            if !guids.insert(reference.guid.clone()) {
                return Err(invalid(format!(
                    "duplicate reference guid `{}`",
                    reference.guid
                )));
            }
        }

        let members = raw
            .workspace
            .map(|ws| ws.members.iter().map(|m| dir.join(m)).collect())
            .unwrap_or_default();

        Ok(Manifest {
            name: package.name,
            version,
            authors: package.authors,
            default_target: package.default_target,
            dependencies,
            src,
            targets,
            references: raw.references,
            members,
            dir,
        })
    }

    /// Path of the manifest file itself.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(Self::FILENAME)
    }

    /// Select a target: explicit selector, else the manifest default, else
    /// a sole target.
    pub fn select_target(&self, selector: Option<&str>) -> Result<&Target, Error> {
        if let Some(selector) = selector {
            return self
                .targets
                .iter()
                .find(|t| t.matches(selector))
                .ok_or_else(|| Error::TargetNoMatching {
                    selector: selector.to_string(),
                });
        }

        if let Some(default) = &self.default_target {
            return self
                .targets
                .iter()
                .find(|t| t.matches(default))
                .ok_or_else(|| Error::TargetNoMatching {
                    selector: default.clone(),
                });
        }

        match self.targets.len() {
            1 => Ok(&self.targets[0]),
            _ => Err(Error::TargetNoDefault),
        }
    }
}

/// Generate a starter project.toml for `vba new`.
pub fn generate_project_manifest(name: &str, target: TargetKind) -> String {
    format!(
        r#"[package]
name = "{name}"
version = "0.1.0"
authors = []

[dependencies]

[[src]]
name = "Main"
path = "src/Main.bas"

[[targets]]
type = "{target}"
blank = true
"#
    )
}
