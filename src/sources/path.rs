//! Path source - local filesystem dependencies.
//!
//! The simplest backend: `resolve` reads the nested manifest to learn the
//! version, `fetch` hands the path back verbatim. Nothing is copied.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::{Dependency, Error, Manifest, Registration, SourceUri};
use crate::sources::Source;

pub struct PathSource;

impl Source for PathSource {
    fn supports(&self, dep: &Dependency) -> bool {
        dep.is_path()
    }

    fn resolve(&self, dep: &Dependency) -> Result<Vec<Registration>> {
        let Dependency::Path { name, path, .. } = dep else {
            return Ok(vec![]);
        };

        let manifest = Manifest::load(path).map_err(|_| Error::DependencyPathNotFound {
            name: name.clone(),
            path: path.clone(),
        })?;

        if manifest.name != *name {
            return Err(Error::DependencyNotFound { name: name.clone() }.into());
        }

        Ok(vec![Registration::new(
            manifest.name.clone(),
            manifest.version.clone(),
            SourceUri::path(path),
            manifest.dependencies.clone(),
            None,
        )])
    }

    fn fetch(&self, registration: &Registration) -> Result<PathBuf> {
        let path = registration
            .source()
            .as_path()
            .ok_or_else(|| Error::DependencyUnknownSource {
                name: registration.name().to_string(),
                source_value: registration.source().to_string(),
            })?;

        if !path.join(Manifest::FILENAME).exists() {
            return Err(Error::DependencyPathNotFound {
                name: registration.name().to_string(),
                path,
            }
            .into());
        }

        Ok(path)
    }
}
