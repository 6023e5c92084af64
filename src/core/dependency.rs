//! Dependency specification.
//!
//! A Dependency describes what a project requires from another package.
//! The variant set is closed: registry, path, and git. New source kinds
//! are added by extending the enum, not by runtime registration.

use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use serde::Deserialize;
use url::Url;

use crate::core::errors::Error;
use crate::util::config::DEFAULT_REGISTRY_NAME;

/// Git reference specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitReference {
    Branch(String),
    Tag(String),
    Rev(String),
}

impl GitReference {
    /// The discriminator name, used for lockfile validity comparison.
    pub fn kind(&self) -> &'static str {
        match self {
            GitReference::Branch(_) => "branch",
            GitReference::Tag(_) => "tag",
            GitReference::Rev(_) => "rev",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            GitReference::Branch(s) | GitReference::Tag(s) | GitReference::Rev(s) => s,
        }
    }
}

/// A typed dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Registry {
        name: String,
        req: VersionReq,
        registry: String,
        features: Vec<String>,
    },
    Path {
        name: String,
        path: PathBuf,
        version: Option<Version>,
    },
    Git {
        name: String,
        url: Url,
        reference: GitReference,
        version: Option<Version>,
    },
}

impl Dependency {
    /// Registry dependency against the default registry.
    pub fn registry(name: impl Into<String>, req: VersionReq) -> Self {
        Dependency::Registry {
            name: name.into(),
            req,
            registry: DEFAULT_REGISTRY_NAME.to_string(),
            features: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Dependency::Registry { name, .. }
            | Dependency::Path { name, .. }
            | Dependency::Git { name, .. } => name,
        }
    }

    /// Check whether a concrete version satisfies this dependency.
    ///
    /// Path and git dependencies constrain by optional exact version;
    /// registry dependencies by their SemVer range.
    pub fn matches_version(&self, version: &Version) -> bool {
        match self {
            Dependency::Registry { req, .. } => req.matches(version),
            Dependency::Path { version: v, .. } | Dependency::Git { version: v, .. } => {
                v.as_ref().map(|v| v == version).unwrap_or(true)
            }
        }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self, Dependency::Registry { .. })
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Dependency::Path { .. })
    }

    pub fn is_git(&self) -> bool {
        matches!(self, Dependency::Git { .. })
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::Registry { name, req, .. } => write!(f, "{} {}", name, req),
            Dependency::Path { name, path, .. } => {
                write!(f, "{} ({})", name, path.display())
            }
            Dependency::Git { name, url, .. } => write!(f, "{} ({})", name, url),
        }
    }
}

/// Dependency specification as it appears in project.toml.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple version string: `json = "^1.0.0"`
    Simple(String),

    /// Detailed specification
    Detailed(DetailedDependencySpec),
}

/// Detailed dependency specification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailedDependencySpec {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub git: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub rev: Option<String>,

    #[serde(default)]
    pub registry: Option<String>,

    #[serde(default)]
    pub features: Option<Vec<String>>,
}

impl DependencySpec {
    /// Convert to a typed Dependency.
    ///
    /// Discrimination priority is `path` > `git` > `version`/bare; relative
    /// paths are resolved against the containing manifest's directory.
    pub fn to_dependency(&self, name: &str, manifest_dir: &Path) -> Result<Dependency, Error> {
        let invalid = |message: String| Error::ManifestInvalid {
            path: manifest_dir.join("project.toml"),
            message,
        };

        match self {
            DependencySpec::Simple(version) => {
                let req = version
                    .parse()
                    .map_err(|e| invalid(format!("dependency `{}`: {}", name, e)))?;
                Ok(Dependency::registry(name, req))
            }
            DependencySpec::Detailed(spec) => {
                if let Some(path) = &spec.path {
                    let full = if path.is_absolute() {
                        path.clone()
                    } else {
                        crate::util::fs::normalize_path(&manifest_dir.join(path))
                    };
                    let version = spec
                        .version
                        .as_deref()
                        .map(|v| v.parse())
                        .transpose()
                        .map_err(|e| invalid(format!("dependency `{}`: {}", name, e)))?;
                    return Ok(Dependency::Path {
                        name: name.to_string(),
                        path: full,
                        version,
                    });
                }

                if let Some(git) = &spec.git {
                    let url = Url::parse(git)
                        .map_err(|e| invalid(format!("dependency `{}`: {}", name, e)))?;
                    let reference = if let Some(rev) = &spec.rev {
                        GitReference::Rev(rev.clone())
                    } else if let Some(tag) = &spec.tag {
                        GitReference::Tag(tag.clone())
                    } else if let Some(branch) = &spec.branch {
                        GitReference::Branch(branch.clone())
                    } else {
                        GitReference::Branch("master".to_string())
                    };
                    let version = spec
                        .version
                        .as_deref()
                        .map(|v| v.parse())
                        .transpose()
                        .map_err(|e| invalid(format!("dependency `{}`: {}", name, e)))?;
                    return Ok(Dependency::Git {
                        name: name.to_string(),
                        url,
                        reference,
                        version,
                    });
                }

                if let Some(version) = &spec.version {
                    let req = version
                        .parse()
                        .map_err(|e| invalid(format!("dependency `{}`: {}", name, e)))?;
                    return Ok(Dependency::Registry {
                        name: name.to_string(),
                        req,
                        registry: spec
                            .registry
                            .clone()
                            .unwrap_or_else(|| DEFAULT_REGISTRY_NAME.to_string()),
                        features: spec.features.clone().unwrap_or_default(),
                    });
                }

                Err(invalid(format!(
                    "dependency `{}` must specify `path`, `git`, or `version`",
                    name
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bare_string_expands_to_registry() {
        let tmp = TempDir::new().unwrap();
        let spec = DependencySpec::Simple("^1.0.0".to_string());
        let dep = spec.to_dependency("json", tmp.path()).unwrap();

        assert!(dep.is_registry());
        assert_eq!(dep.name(), "json");
        assert!(dep.matches_version(&Version::new(1, 2, 0)));
        assert!(!dep.matches_version(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_path_takes_priority_over_version() {
        let tmp = TempDir::new().unwrap();
        let spec = DependencySpec::Detailed(DetailedDependencySpec {
            path: Some(PathBuf::from("../local")),
            version: Some("1.0.0".to_string()),
            ..Default::default()
        });

        let dep = spec.to_dependency("local", tmp.path()).unwrap();
        assert!(dep.is_path());
    }

    #[test]
    fn test_git_reference_priority() {
        let tmp = TempDir::new().unwrap();
        let spec = DependencySpec::Detailed(DetailedDependencySpec {
            git: Some("https://github.com/user/repo".to_string()),
            tag: Some("v1.0".to_string()),
            branch: Some("main".to_string()),
            ..Default::default()
        });

        let dep = spec.to_dependency("repo", tmp.path()).unwrap();
        match dep {
            Dependency::Git { reference, .. } => {
                assert_eq!(reference, GitReference::Tag("v1.0".to_string()));
            }
            _ => panic!("expected git dependency"),
        }
    }

    #[test]
    fn test_empty_spec_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let spec = DependencySpec::Detailed(DetailedDependencySpec::default());

        let err = spec.to_dependency("broken", tmp.path()).unwrap_err();
        assert_eq!(err.kind(), "manifest-invalid");
    }
}
