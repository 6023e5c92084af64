//! Lockfile encoding and decoding.
//!
//! `project.lock` is written deterministically: fixed section order
//! (`[metadata]`, `[root]`, `[[members]]`, `[[package]]`), alphabetised
//! keys within each table, multi-line arrays with trailing commas, and
//! packages sorted by name. Path sources are stored POSIX-relative to the
//! project directory with a trailing slash, so lockfiles survive VCS
//! across machines.
//!
//! Reading is lenient by design: any parse or validation failure reads as
//! "no lockfile" and the pipeline falls back to a fresh resolve.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};

use crate::core::{Dependency, GitReference, Manifest, Registration, SourceKind, SourceUri, Workspace};
use crate::resolver::DependencyGraph;
use crate::util::fs::posix_relative_dir;

/// Version of the lockfile format.
pub const LOCK_VERSION: &str = "1";

const HEADER: &str = "# Auto-generated by vba-blocks. Changes may be overwritten.";

/// The lockfile projection of one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedSnapshot {
    pub name: String,
    pub version: Version,

    /// Names of locked dependencies; ids are derived from `packages`
    pub dependencies: Vec<String>,
}

/// A parsed or freshly-built lockfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockfile {
    pub root: LockedSnapshot,
    pub members: Vec<LockedSnapshot>,

    /// Locked registrations, sorted by name, with exact-pinned
    /// placeholder dependencies
    pub packages: Vec<Registration>,
}

impl Lockfile {
    /// Build a lockfile from a resolved workspace.
    pub fn from_graph(workspace: &Workspace, graph: &DependencyGraph) -> Self {
        let snapshot = |name: &str, version: &Version, deps: &[Dependency]| {
            let mut names: Vec<String> = deps
                .iter()
                .filter(|dep| graph.get(dep.name()).is_some())
                .map(|dep| dep.name().to_string())
                .collect();
            names.sort();
            LockedSnapshot {
                name: name.to_string(),
                version: version.clone(),
                dependencies: names,
            }
        };

        Lockfile {
            root: snapshot(
                &workspace.root.name,
                &workspace.root.version,
                &workspace.root.dependencies,
            ),
            members: workspace
                .members
                .iter()
                .map(|m| snapshot(&m.name, &m.version, &m.dependencies))
                .collect(),
            packages: graph.registrations().to_vec(),
        }
    }

    /// The locked registrations, for lock-preserving resolves.
    pub fn registrations(&self) -> &[Registration] {
        &self.packages
    }

    fn package(&self, name: &str) -> Option<&Registration> {
        self.packages.iter().find(|p| p.name() == name)
    }

    /// Render the lockfile deterministically.
    pub fn render(&self, dir: &Path) -> String {
        let id_of = |name: &str| -> Option<String> {
            let package = self.package(name)?;
            Some(format!(
                "{} {} {}",
                package.name(),
                package.version(),
                relativize(package.source(), dir)
            ))
        };

        let mut out = String::new();
        out.push_str(HEADER);
        out.push_str("\n\n[metadata]\n");
        out.push_str(&format!("version = {:?}\n", LOCK_VERSION));

        let snapshot_section = |header: &str, snapshot: &LockedSnapshot, out: &mut String| {
            out.push_str(&format!("\n{}\n", header));
            push_array(
                out,
                "dependencies",
                snapshot.dependencies.iter().filter_map(|name| id_of(name)),
            );
            out.push_str(&format!("name = {:?}\n", snapshot.name));
            out.push_str(&format!("version = {:?}\n", snapshot.version.to_string()));
        };

        snapshot_section("[root]", &self.root, &mut out);
        for member in &self.members {
            snapshot_section("[[members]]", member, &mut out);
        }

        for package in &self.packages {
            out.push_str("\n[[package]]\n");
            let mut dep_names: Vec<&str> =
                package.dependencies().iter().map(|d| d.name()).collect();
            dep_names.sort();
            push_array(
                &mut out,
                "dependencies",
                dep_names.into_iter().filter_map(|name| id_of(name)),
            );
            out.push_str(&format!("name = {:?}\n", package.name()));
            out.push_str(&format!(
                "source = {:?}\n",
                relativize(package.source(), dir).to_string()
            ));
            out.push_str(&format!("version = {:?}\n", package.version().to_string()));
        }

        out
    }

    /// Parse lockfile content. Any failure reads as "no lockfile".
    pub fn parse(content: &str, dir: &Path) -> Option<Lockfile> {
        let raw: RawLockfile = toml::from_str(content).ok()?;

        if raw.metadata.version != LOCK_VERSION {
            return None;
        }

        // First pass: placeholder dependencies by name from the registered
        // packages.
        let mut placeholders: HashMap<String, Dependency> = HashMap::new();
        let mut partial: Vec<(RawPackage, Version, SourceUri)> = Vec::new();

        for package in raw.packages {
            let version: Version = package.version.parse().ok()?;
            let source = absolutize(SourceUri::parse(&package.source).ok()?, dir);
            placeholders.insert(
                package.name.clone(),
                placeholder(&package.name, &version, &source)?,
            );
            partial.push((package, version, source));
        }

        // Second pass: hydrate each package's dependencies by splitting the
        // id and looking up its name.
        let mut packages = Vec::with_capacity(partial.len());
        for (package, version, source) in partial {
            let dependencies = package
                .dependencies
                .iter()
                .filter_map(|id| placeholders.get(id_name(id)?).cloned())
                .collect();
            packages.push(Registration::new(
                package.name,
                version,
                source,
                dependencies,
                None,
            ));
        }

        let snapshot = |raw: RawSnapshot| -> Option<LockedSnapshot> {
            Some(LockedSnapshot {
                name: raw.name,
                version: raw.version.parse().ok()?,
                dependencies: raw
                    .dependencies
                    .iter()
                    .filter_map(|id| Some(id_name(id)?.to_string()))
                    .collect(),
            })
        };

        Some(Lockfile {
            root: snapshot(raw.root)?,
            members: raw
                .members
                .into_iter()
                .map(snapshot)
                .collect::<Option<Vec<_>>>()?,
            packages,
        })
    }

    /// Is this lockfile still valid for the workspace?
    ///
    /// Valid means: every snapshot matches by name, version, and dependency
    /// set, and every locked dependency still satisfies the manifest's
    /// current declaration.
    pub fn is_valid(&self, workspace: &Workspace) -> bool {
        if !self.snapshot_matches(&self.root, &workspace.root.name, &workspace.root.version, &workspace.root.dependencies) {
            return false;
        }

        if self.members.len() != workspace.members.len() {
            return false;
        }
        for member in &workspace.members {
            let Some(locked) = self.members.iter().find(|m| m.name == member.name) else {
                return false;
            };
            if !self.snapshot_matches(locked, &member.name, &member.version, &member.dependencies)
            {
                return false;
            }
        }

        workspace
            .dependencies()
            .all(|dep| self.dependency_still_locked(dep))
    }

    fn snapshot_matches(
        &self,
        locked: &LockedSnapshot,
        name: &str,
        version: &Version,
        dependencies: &[Dependency],
    ) -> bool {
        if locked.name != name || locked.version != *version {
            return false;
        }

        let mut current: Vec<&str> = dependencies.iter().map(|d| d.name()).collect();
        current.sort();
        current.dedup();
        let mut recorded: Vec<&str> = locked.dependencies.iter().map(String::as_str).collect();
        recorded.sort();

        current == recorded
    }

    fn dependency_still_locked(&self, dep: &Dependency) -> bool {
        let Some(locked) = self.package(dep.name()) else {
            return false;
        };

        match dep {
            Dependency::Registry { req, registry, .. } => {
                locked.source().is_registry()
                    && locked.source().value() == registry
                    && req.matches(locked.version())
            }
            Dependency::Path { path, .. } => {
                let Some(locked_path) = locked.source().as_path() else {
                    return false;
                };
                if crate::util::fs::normalize_path(path)
                    != crate::util::fs::normalize_path(&locked_path)
                {
                    return false;
                }
                // Version drift in the nested manifest invalidates the lock.
                match Manifest::load(path) {
                    Ok(manifest) => manifest.version == *locked.version(),
                    Err(_) => false,
                }
            }
            Dependency::Git { url, reference, .. } => {
                if !locked.source().is_git() || locked.source().value() != url.as_str() {
                    return false;
                }
                match reference {
                    GitReference::Rev(rev) => locked
                        .source()
                        .details()
                        .map(|locked_rev| locked_rev.starts_with(rev.as_str()))
                        .unwrap_or(false),
                    // Branch and tag tips move; the pinned commit stays
                    // valid as long as the refspec itself is unchanged.
                    _ => true,
                }
            }
        }
    }
}

/// `"{name} {version} {source}"` → name.
fn id_name(id: &str) -> Option<&str> {
    id.split_whitespace().next()
}

/// Exact-pinned dependency minted from a locked package.
fn placeholder(name: &str, version: &Version, source: &SourceUri) -> Option<Dependency> {
    match source.kind() {
        SourceKind::Registry => Some(Dependency::Registry {
            name: name.to_string(),
            req: VersionReq::parse(&format!("={}", version)).ok()?,
            registry: source.value().to_string(),
            features: Vec::new(),
        }),
        SourceKind::Path => Some(Dependency::Path {
            name: name.to_string(),
            path: PathBuf::from(source.value()),
            version: Some(version.clone()),
        }),
        SourceKind::Git => Some(Dependency::Git {
            name: name.to_string(),
            url: source.value().parse().ok()?,
            reference: GitReference::Rev(source.details().unwrap_or_default().to_string()),
            version: Some(version.clone()),
        }),
    }
}

fn relativize(source: &SourceUri, dir: &Path) -> SourceUri {
    match source.as_path() {
        Some(path) => source
            .clone()
            .with_value(posix_relative_dir(dir, &path)),
        None => source.clone(),
    }
}

fn absolutize(source: SourceUri, dir: &Path) -> SourceUri {
    match source.as_path() {
        Some(path) if !path.is_absolute() => {
            let joined = dir.join(path);
            source.with_value(joined.to_string_lossy().into_owned())
        }
        _ => source,
    }
}

/// Emit `key = []` or a multi-line array with trailing commas.
fn push_array(out: &mut String, key: &str, items: impl Iterator<Item = String>) {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        out.push_str(&format!("{} = []\n", key));
        return;
    }

    out.push_str(&format!("{} = [\n", key));
    for item in items {
        out.push_str(&format!("  {:?},\n", item));
    }
    out.push_str("]\n");
}

#[derive(Debug, serde::Deserialize)]
struct RawLockfile {
    metadata: RawMetadata,
    root: RawSnapshot,

    #[serde(default)]
    members: Vec<RawSnapshot>,

    #[serde(rename = "package", default)]
    packages: Vec<RawPackage>,
}

#[derive(Debug, serde::Deserialize)]
struct RawMetadata {
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct RawSnapshot {
    name: String,
    version: String,

    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    source: String,

    #[serde(default)]
    dependencies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Snapshot;
    use tempfile::TempDir;

    fn registry_reg(name: &str, version: &str, deps: &[&str]) -> Registration {
        Registration::new(
            name,
            version.parse::<Version>().unwrap(),
            SourceUri::registry("default"),
            deps.iter()
                .map(|n| Dependency::registry(*n, VersionReq::parse("^1.0").unwrap()))
                .collect(),
            None,
        )
    }

    fn workspace_with(deps: Vec<Dependency>) -> Workspace {
        Workspace {
            root: Snapshot {
                name: "standard".to_string(),
                version: Version::new(0, 1, 0),
                dependencies: deps,
            },
            members: vec![],
        }
    }

    #[test]
    fn test_render_format() {
        let graph = DependencyGraph::new(vec![registry_reg("json", "1.1.0", &[])]).unwrap();
        let ws = workspace_with(vec![Dependency::registry(
            "json",
            VersionReq::parse("^1.0.0").unwrap(),
        )]);

        let lockfile = Lockfile::from_graph(&ws, &graph);
        let rendered = lockfile.render(Path::new("/proj"));

        assert!(rendered.starts_with("# Auto-generated"));
        assert!(rendered.contains("[metadata]\nversion = \"1\""));
        assert!(rendered.contains("[root]"));
        assert!(rendered.contains("\"json 1.1.0 registry+default\","));
        assert!(rendered.contains("[[package]]"));
        assert!(rendered.contains("dependencies = []"));
    }

    #[test]
    fn test_roundtrip_byte_stable() {
        let dir = Path::new("/proj");
        let graph = DependencyGraph::new(vec![
            registry_reg("dictionary", "1.4.1", &[]),
            registry_reg("json", "1.1.0", &["dictionary"]),
        ])
        .unwrap();
        let ws = workspace_with(vec![Dependency::registry(
            "json",
            VersionReq::parse("^1.0.0").unwrap(),
        )]);

        let rendered = Lockfile::from_graph(&ws, &graph).render(dir);
        let reparsed = Lockfile::parse(&rendered, dir).unwrap();

        assert_eq!(reparsed.render(dir), rendered);
    }

    #[test]
    fn test_roundtrip_structural() {
        let dir = Path::new("/proj");
        let graph = DependencyGraph::new(vec![registry_reg("json", "1.1.0", &[])]).unwrap();
        let ws = workspace_with(vec![Dependency::registry(
            "json",
            VersionReq::parse("^1.0.0").unwrap(),
        )]);

        let lockfile = Lockfile::from_graph(&ws, &graph);
        let reparsed = Lockfile::parse(&lockfile.render(dir), dir).unwrap();

        assert_eq!(reparsed.root, lockfile.root);
        assert_eq!(reparsed.packages.len(), 1);
        assert_eq!(reparsed.packages[0].name(), "json");
        assert_eq!(reparsed.packages[0].version(), &Version::new(1, 1, 0));
        assert_eq!(
            reparsed.packages[0].source().to_string(),
            "registry+default"
        );
    }

    #[test]
    fn test_path_sources_relative_with_trailing_slash() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("proj");
        let dep_dir = tmp.path().join("packages").join("local");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::create_dir_all(&dep_dir).unwrap();

        let reg = Registration::new(
            "local",
            Version::new(1, 0, 0),
            SourceUri::path(&dep_dir),
            vec![],
            None,
        );
        let graph = DependencyGraph::new(vec![reg]).unwrap();
        let ws = workspace_with(vec![Dependency::Path {
            name: "local".to_string(),
            path: dep_dir.clone(),
            version: None,
        }]);

        let rendered = Lockfile::from_graph(&ws, &graph).render(&dir);
        assert!(rendered.contains("source = \"path+../packages/local/\""));

        // Rehydrates to absolute
        let reparsed = Lockfile::parse(&rendered, &dir).unwrap();
        let hydrated = reparsed.packages[0].source().as_path().unwrap();
        assert_eq!(
            crate::util::fs::normalize_path(&hydrated),
            crate::util::fs::normalize_path(&dep_dir)
        );
    }

    #[test]
    fn test_parse_garbage_is_no_lockfile() {
        assert!(Lockfile::parse("not toml [", Path::new("/p")).is_none());
        assert!(Lockfile::parse("[metadata]\nversion = \"99\"\n[root]\nname = \"x\"\nversion = \"1.0.0\"\n", Path::new("/p")).is_none());
        // Missing [root]
        assert!(Lockfile::parse("[metadata]\nversion = \"1\"\n", Path::new("/p")).is_none());
    }

    #[test]
    fn test_validity_registry_range() {
        let graph = DependencyGraph::new(vec![registry_reg("json", "1.1.0", &[])]).unwrap();
        let ws = workspace_with(vec![Dependency::registry(
            "json",
            VersionReq::parse("^1.0.0").unwrap(),
        )]);
        let lockfile = Lockfile::from_graph(&ws, &graph);
        assert!(lockfile.is_valid(&ws));

        // Constraint moved past the locked version
        let ws2 = workspace_with(vec![Dependency::registry(
            "json",
            VersionReq::parse("^2.0.0").unwrap(),
        )]);
        assert!(!lockfile.is_valid(&ws2));

        // New dependency appeared
        let ws3 = workspace_with(vec![
            Dependency::registry("json", VersionReq::parse("^1.0.0").unwrap()),
            Dependency::registry("dictionary", VersionReq::parse("^1.0.0").unwrap()),
        ]);
        assert!(!lockfile.is_valid(&ws3));
    }

    #[test]
    fn test_validity_root_version_change() {
        let graph = DependencyGraph::empty();
        let ws = workspace_with(vec![]);
        let lockfile = Lockfile::from_graph(&ws, &graph);

        let mut ws2 = ws.clone();
        ws2.root.version = Version::new(0, 2, 0);
        assert!(lockfile.is_valid(&ws));
        assert!(!lockfile.is_valid(&ws2));
    }

    #[test]
    fn test_validity_path_version_drift() {
        let tmp = TempDir::new().unwrap();
        let dep_dir = tmp.path().join("local");
        std::fs::create_dir_all(&dep_dir).unwrap();
        std::fs::write(
            dep_dir.join("project.toml"),
            "[package]\nname = \"local\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        let reg = Registration::new(
            "local",
            Version::new(1, 0, 0),
            SourceUri::path(&dep_dir),
            vec![],
            None,
        );
        let graph = DependencyGraph::new(vec![reg]).unwrap();
        let ws = workspace_with(vec![Dependency::Path {
            name: "local".to_string(),
            path: dep_dir.clone(),
            version: None,
        }]);
        let lockfile = Lockfile::from_graph(&ws, &graph);
        assert!(lockfile.is_valid(&ws));

        // The nested manifest's version changes; the lock is stale.
        std::fs::write(
            dep_dir.join("project.toml"),
            "[package]\nname = \"local\"\nversion = \"1.1.0\"\n",
        )
        .unwrap();
        assert!(!lockfile.is_valid(&ws));
    }
}
