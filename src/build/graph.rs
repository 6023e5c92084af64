//! Build graph loading.
//!
//! A BuildGraph is the union of every component contributed by the project
//! and its resolved dependencies, with conflict detection on names and
//! references. The per-target projection is an ImportGraph.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;

use crate::core::{Component, ComponentKind, Error, Manifest, Project, Reference, Target};
use crate::resolver::DependencyGraph;
use crate::util::GlobalContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    /// Components sorted by name
    components: Vec<Component>,

    /// Merged references, sorted by guid
    references: Vec<Reference>,
}

/// The per-target subset of a BuildGraph staged for import.
#[derive(Debug, Clone)]
pub struct ImportGraph {
    pub target: Target,
    pub components: Vec<Component>,
    pub references: Vec<Reference>,
}

impl BuildGraph {
    /// Load the full graph: the root project's `src` entries plus every
    /// dependency's, reading component files in parallel.
    pub fn load(
        ctx: &GlobalContext,
        project: &Project,
        graph: &DependencyGraph,
        fetched: &HashMap<String, PathBuf>,
    ) -> Result<Self> {
        ctx.check_abort()?;

        let mut manifests: Vec<Manifest> = vec![project.manifest.clone()];
        manifests.extend(project.members.iter().cloned());
        for registration in graph {
            let dir = fetched.get(registration.name()).ok_or_else(|| {
                Error::DependencyNotFound {
                    name: registration.name().to_string(),
                }
            })?;
            manifests.push(Manifest::load(dir)?);
        }

        let entries: Vec<(PathBuf, Vec<Reference>)> = manifests
            .iter()
            .flat_map(|manifest| {
                manifest.src.iter().map(|entry| {
                    (
                        entry.resolved_path(&manifest.dir),
                        manifest.references.clone(),
                    )
                })
            })
            .collect();

        let components = entries
            .par_iter()
            .map(|(path, references)| {
                ctx.check_abort()?;
                Ok(Component::load(path, references.clone())?)
            })
            .collect::<Result<Vec<_>>>()?;

        let references = manifests
            .iter()
            .flat_map(|m| m.references.iter().cloned())
            .collect();

        Self::assemble(components, references)
    }

    /// Build a graph from a directory of exported component files, as
    /// produced by the bridge's `export`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut references = Vec::new();
        let references_path = dir.join("references.toml");
        if references_path.exists() {
            #[derive(serde::Deserialize)]
            struct RawReferences {
                #[serde(default)]
                references: Vec<Reference>,
            }
            let content = crate::util::fs::read_to_string(&references_path)?;
            let raw: RawReferences = toml::from_str(&content)
                .map_err(|e| Error::BuildInvalid {
                    message: format!("malformed references.toml: {}", e),
                })?;
            references = raw.references;
        }

        let mut components = Vec::new();
        for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ComponentKind::from_extension(ext).is_none() {
                // Sidecars and metadata files ride along with exports.
                continue;
            }
            components.push(Component::load(path, references.clone())?);
        }

        Self::assemble(components, references)
    }

    /// Validate names and references, then fix the canonical order.
    fn assemble(mut components: Vec<Component>, references: Vec<Reference>) -> Result<Self> {
        components.sort_by(|a, b| a.name().cmp(b.name()));

        for pair in components.windows(2) {
            if pair[0].name() == pair[1].name() {
                return Err(Error::BuildInvalid {
                    message: format!(
                        "component `{}` is contributed twice ({} and {})",
                        pair[0].name(),
                        pair[0].details().path.display(),
                        pair[1].details().path.display()
                    ),
                }
                .into());
            }
        }

        Ok(BuildGraph {
            components,
            references: merge_references(references)?,
        })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// Project this graph for a target.
    pub fn import_graph(&self, target: &Target) -> ImportGraph {
        ImportGraph {
            target: target.clone(),
            components: self.components.clone(),
            references: self.references.clone(),
        }
    }
}

/// Merge references: duplicates collapse, same GUID with a differing
/// major/minor is a conflict.
fn merge_references(references: Vec<Reference>) -> Result<Vec<Reference>> {
    let mut by_guid: HashMap<String, Reference> = HashMap::new();

    for reference in references {
        match by_guid.get(&reference.guid) {
            None => {
                by_guid.insert(reference.guid.clone(), reference);
            }
            Some(existing) => {
                if existing.major != reference.major || existing.minor != reference.minor {
                    return Err(Error::BuildInvalid {
                        message: format!(
                            "reference `{}` ({}) is required at both {}.{} and {}.{}",
                            reference.name,
                            reference.guid,
                            existing.major,
                            existing.minor,
                            reference.major,
                            reference.minor
                        ),
                    }
                    .into());
                }
            }
        }
    }

    let mut merged: Vec<Reference> = by_guid.into_values().collect();
    merged.sort_by(|a, b| a.guid.cmp(&b.guid));
    Ok(merged)
}
