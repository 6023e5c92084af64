//! Project - the loaded workspace root plus member manifests.

use std::path::{Path, PathBuf};

use crate::core::errors::Error;
use crate::core::manifest::Manifest;
use crate::core::snapshot::{Snapshot, Workspace};

/// A loaded project: the root manifest and every workspace member.
#[derive(Debug, Clone)]
pub struct Project {
    pub manifest: Manifest,
    pub members: Vec<Manifest>,
}

impl Project {
    /// Load the project rooted at `dir`.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let manifest = Manifest::load(dir)?;

        let mut members = Vec::with_capacity(manifest.members.len());
        let mut seen = std::collections::HashSet::new();
        seen.insert(manifest.name.clone());

        for member_dir in &manifest.members {
            let member = Manifest::load(member_dir)?;
            if !seen.insert(member.name.clone()) {
                return Err(Error::ManifestInvalid {
                    path: member.manifest_path(),
                    message: format!("duplicate member name `{}`", member.name),
                });
            }
            members.push(member);
        }

        Ok(Project { manifest, members })
    }

    pub fn dir(&self) -> &Path {
        &self.manifest.dir
    }

    /// Path of the lockfile next to the manifest.
    pub fn lockfile_path(&self) -> PathBuf {
        self.dir().join("project.lock")
    }

    /// Snapshot projection used by the resolver and lockfile.
    pub fn workspace(&self) -> Workspace {
        Workspace {
            root: Snapshot::from_manifest(&self.manifest),
            members: self.members.iter().map(Snapshot::from_manifest).collect(),
        }
    }
}
