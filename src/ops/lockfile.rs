//! Lockfile I/O.

use anyhow::Result;

use crate::core::{Error, Project, Workspace};
use crate::resolver::{DependencyGraph, Lockfile};
use crate::util::fs::atomic_write;

/// Read the project's lockfile.
///
/// Missing files and parse failures both read as `None`; the pipeline
/// falls back to a fresh resolve rather than aborting.
pub fn read_lockfile(project: &Project) -> Option<Lockfile> {
    let content = std::fs::read_to_string(project.lockfile_path()).ok()?;
    Lockfile::parse(&content, project.dir())
}

/// Write the lockfile for a resolved graph, skipping the write when the
/// rendered bytes are unchanged.
pub fn write_lockfile(
    project: &Project,
    workspace: &Workspace,
    graph: &DependencyGraph,
) -> Result<()> {
    let rendered = Lockfile::from_graph(workspace, graph).render(project.dir());
    let path = project.lockfile_path();

    if let Ok(existing) = std::fs::read_to_string(&path) {
        if existing == rendered {
            return Ok(());
        }
    }

    atomic_write(&path, rendered.as_bytes()).map_err(|e| Error::LockfileWriteFailed {
        path: path.clone(),
        message: format!("{:#}", e),
    })?;

    Ok(())
}
