//! Project resolution: lockfile-aware resolve plus source fetching.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use crate::core::Project;
use crate::ops::lockfile::{read_lockfile, write_lockfile};
use crate::resolver::{self, DependencyGraph};
use crate::sources::SourceManager;
use crate::util::GlobalContext;

/// Resolve the project's dependency graph.
///
/// A lockfile that is still valid for the workspace pins every version;
/// an invalid or missing one is discarded and the resolve runs fresh. The
/// lockfile on disk is rewritten only when its contents change.
pub fn resolve_project(
    ctx: &GlobalContext,
    project: &Project,
    sources: &SourceManager,
) -> Result<DependencyGraph> {
    ctx.check_abort()?;

    let workspace = project.workspace();

    let locked = match read_lockfile(project) {
        Some(lockfile) if lockfile.is_valid(&workspace) => {
            tracing::debug!("lockfile is valid, preferring locked versions");
            lockfile.packages
        }
        Some(_) => {
            tracing::debug!("lockfile is stale, resolving fresh");
            Vec::new()
        }
        None => Vec::new(),
    };

    let graph = resolver::resolve(&workspace, &locked, sources)?;
    write_lockfile(project, &workspace, &graph)?;

    Ok(graph)
}

/// Fetch every resolved registration; returns name → local source dir.
pub fn fetch_dependencies(
    ctx: &GlobalContext,
    sources: &SourceManager,
    graph: &DependencyGraph,
) -> Result<HashMap<String, PathBuf>> {
    let reporter = ctx.reporter();
    reporter.start("Fetching", graph.len() as u64);
    let fetched = sources.fetch_all(ctx, graph.registrations())?;
    reporter.finish();
    Ok(fetched)
}
