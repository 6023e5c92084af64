//! Registration - a resolved, uniquely-identified package version at a
//! specific source.
//!
//! Registrations are the resolver's nodes and the lockfile's entries. They
//! are immutable once minted; the id `"{name} {version} {source}"` is
//! globally unique.

use semver::Version;

use crate::core::dependency::Dependency;
use crate::core::source_id::SourceUri;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    name: String,
    version: Version,
    source: SourceUri,
    dependencies: Vec<Dependency>,
    checksum: Option<String>,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        source: SourceUri,
        dependencies: Vec<Dependency>,
        checksum: Option<String>,
    ) -> Self {
        Registration {
            name: name.into(),
            version,
            source,
            dependencies,
            checksum,
        }
    }

    /// The globally unique id: `"{name} {version} {source}"`.
    pub fn id(&self) -> String {
        format!("{} {} {}", self.name, self.version, self.source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn source(&self) -> &SourceUri {
        &self.source
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// A copy with the source swapped; used by the lockfile codec when
    /// rehydrating relative path sources to absolute ones.
    pub fn with_source(mut self, source: SourceUri) -> Self {
        self.source = source;
        self
    }
}

impl std::fmt::Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_id() {
        let reg = Registration::new(
            "json",
            Version::new(1, 1, 0),
            SourceUri::registry("default"),
            vec![],
            None,
        );

        assert_eq!(reg.id(), "json 1.1.0 registry+default");
    }
}
