//! Source manager - routes dependencies and registrations to backends.
//!
//! Holds one registry backend per configured registry name, plus the path
//! and git backends. Backends are filesystem-cached and `Sync`, so fetches
//! fan out over rayon without further coordination.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use rayon::prelude::*;

use crate::core::{Dependency, Error, Registration, SourceKind};
use crate::sources::{GitSource, PathSource, RegistrySource, Source};
use crate::util::GlobalContext;

pub struct SourceManager {
    registries: HashMap<String, RegistrySource>,
    path_source: PathSource,
    git_source: GitSource,
}

impl SourceManager {
    /// Build backends from the context's configuration.
    pub fn new(ctx: &GlobalContext) -> Self {
        let sources_dir = ctx.sources_dir();

        let registries = ctx
            .config()
            .registries
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    RegistrySource::new(name, entry.index.clone(), &sources_dir),
                )
            })
            .collect();

        SourceManager {
            registries,
            path_source: PathSource,
            git_source: GitSource::new(&sources_dir),
        }
    }

    fn registry(&self, name: &str) -> Result<&RegistrySource, Error> {
        self.registries
            .get(name)
            .ok_or_else(|| Error::SourceMisconfiguredRegistry {
                name: name.to_string(),
            })
    }

    fn source_for(&self, dep: &Dependency) -> Result<&dyn Source> {
        let source: &dyn Source = match dep {
            Dependency::Registry { registry, .. } => self.registry(registry)?,
            Dependency::Path { .. } => &self.path_source,
            Dependency::Git { .. } => &self.git_source,
        };

        if !source.supports(dep) {
            return Err(Error::SourceNoMatching {
                name: dep.name().to_string(),
            }
            .into());
        }

        Ok(source)
    }

    /// Enumerate candidate registrations for a dependency.
    pub fn resolve(&self, dep: &Dependency) -> Result<Vec<Registration>> {
        self.source_for(dep)?.resolve(dep)
    }

    /// Materialise one registration and return its local directory.
    pub fn fetch(&self, registration: &Registration) -> Result<PathBuf> {
        let source: &dyn Source = match registration.source().kind() {
            SourceKind::Registry => self.registry(registration.source().value())?,
            SourceKind::Path => &self.path_source,
            SourceKind::Git => &self.git_source,
        };
        source.fetch(registration)
    }

    /// Fetch every registration, fanning out over the rayon pool.
    ///
    /// Items target disjoint cache entries, so no inter-item ordering is
    /// imposed. Returns name → local directory.
    pub fn fetch_all(
        &self,
        ctx: &GlobalContext,
        registrations: &[Registration],
    ) -> Result<HashMap<String, PathBuf>> {
        ctx.check_abort()?;

        let reporter = ctx.reporter();
        let fetched = registrations
            .par_iter()
            .map(|registration| {
                ctx.check_abort()?;
                let dir = self.fetch(registration)?;
                reporter.tick(registration.name());
                Ok((registration.name().to_string(), dir))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(fetched)
    }

    /// Refresh all registry indexes.
    pub fn update(&self) -> Result<()> {
        for registry in self.registries.values() {
            registry.update()?;
        }
        Ok(())
    }
}
