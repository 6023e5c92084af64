//! Snapshot - the lockfile-oriented projection of a manifest.
//!
//! A snapshot carries just enough to detect manifest drift without
//! re-resolving: name, version, and the declared dependency list.

use semver::Version;

use crate::core::dependency::Dependency;
use crate::core::manifest::Manifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Snapshot {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            dependencies: manifest.dependencies.clone(),
        }
    }
}

/// The workspace as the resolver and lockfile see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: Snapshot,
    pub members: Vec<Snapshot>,
}

impl Workspace {
    /// All direct dependencies of root and members, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.root
            .dependencies
            .iter()
            .chain(self.members.iter().flat_map(|m| m.dependencies.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::VersionReq;

    fn snapshot(name: &str, deps: &[&str]) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            version: Version::new(1, 0, 0),
            dependencies: deps
                .iter()
                .map(|d| Dependency::registry(*d, VersionReq::parse("^1.0").unwrap()))
                .collect(),
        }
    }

    #[test]
    fn test_workspace_dependencies() {
        let ws = Workspace {
            root: snapshot("root", &["a", "b"]),
            members: vec![snapshot("member", &["c"])],
        };

        let names: Vec<_> = ws.dependencies().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
