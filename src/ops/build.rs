//! The build pipeline.
//!
//! manifest → resolve → lockfile → fetch → build graph → per target:
//! stage → changeset apply through the addin bridge.

use std::path::PathBuf;

use anyhow::Result;

use crate::addin::{locate_bridge, AddinBridge};
use crate::build::{apply_changeset, diff, stage_import_graph, BuildGraph};
use crate::core::{Error, Project, Target};
use crate::ops::resolve::{fetch_dependencies, resolve_project};
use crate::sources::SourceManager;
use crate::util::fs::ScopedDir;
use crate::util::GlobalContext;

#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Build only the matching target (type or name)
    pub target: Option<String>,

    /// Rebuild targets from blank instead of patching in place
    pub release: bool,

    /// Leave the built document open in the host application
    pub open: bool,

    /// Explicit bridge script
    pub addin: Option<PathBuf>,
}

pub fn build(ctx: &GlobalContext, options: &BuildOptions) -> Result<()> {
    let project = Project::load(ctx.cwd())?;
    let sources = SourceManager::new(ctx);

    let graph = resolve_project(ctx, &project, &sources)?;
    let fetched = fetch_dependencies(ctx, &sources, &graph)?;

    ctx.check_abort()?;
    let build_graph = BuildGraph::load(ctx, &project, &graph, &fetched)?;

    let targets: Vec<Target> = match &options.target {
        Some(selector) => vec![project.manifest.select_target(Some(selector))?.clone()],
        None => project.manifest.targets.clone(),
    };
    if targets.is_empty() {
        tracing::info!("project has no targets; lockfile is up to date");
        return Ok(());
    }

    let bridge = locate_bridge(ctx.cache_root(), options.addin.as_deref())?;

    for target in &targets {
        ctx.check_abort()?;
        build_target(ctx, &bridge, &project, &build_graph, target, options)?;
    }

    Ok(())
}

/// Build one target: derive its previous graph, stage, and apply.
pub fn build_target(
    ctx: &GlobalContext,
    bridge: &dyn AddinBridge,
    project: &Project,
    build_graph: &BuildGraph,
    target: &Target,
    options: &BuildOptions,
) -> Result<()> {
    let target_path = target.file_path(project.dir());

    if !target_path.exists() && !target.blank {
        return Err(Error::TargetNotFound { path: target_path }.into());
    }
    if let Some(parent) = target_path.parent() {
        crate::util::fs::ensure_dir(parent)?;
    }

    // Previous contents via the bridge's export; a blank or release build
    // diffs against nothing.
    let previous = if target_path.exists() && !options.release {
        let export_dir = ScopedDir::create(
            ctx.staging_dir()
                .join(format!("{}-{}-previous", target.name, target.kind)),
        )?;
        let handle = bridge.open(&target_path)?;
        let exported = bridge.export(&handle, export_dir.path());
        bridge.close(handle, false)?;
        exported?;
        BuildGraph::from_dir(export_dir.path())?
    } else {
        BuildGraph::default()
    };

    let import = build_graph.import_graph(target);
    let staged = stage_import_graph(ctx, &import)?;
    let changeset = diff(&previous, &import)?;

    tracing::info!(
        "building {}: +{} ~{} -{}",
        target.filename,
        changeset.added.len(),
        changeset.changed.len(),
        changeset.removed.len()
    );

    apply_changeset(ctx, bridge, &target_path, &staged, &changeset)?;

    if options.open {
        // Leave the document open for the user; the handle is deliberately
        // not closed.
        bridge.open(&target_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_project, MockBridge};
    use tempfile::TempDir;

    fn context(tmp: &TempDir) -> GlobalContext {
        GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"))
    }

    #[test]
    fn test_fresh_build_creates_target_and_lockfile() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "standard");
        let ctx = context(&tmp);

        let project = Project::load(tmp.path()).unwrap();
        let sources = SourceManager::new(&ctx);
        let graph = resolve_project(&ctx, &project, &sources).unwrap();
        let fetched = fetch_dependencies(&ctx, &sources, &graph).unwrap();
        let build_graph = BuildGraph::load(&ctx, &project, &graph, &fetched).unwrap();

        let bridge = MockBridge::new();
        let target = project.manifest.targets[0].clone();
        build_target(
            &ctx,
            &bridge,
            &project,
            &build_graph,
            &target,
            &BuildOptions::default(),
        )
        .unwrap();

        // The blank target was created through the bridge's open.
        assert!(target.file_path(project.dir()).exists());
        assert!(project.lockfile_path().exists());
        assert_eq!(bridge.calls(), vec!["open", "import", "close save"]);

        // Staging directory is cleaned up after completion.
        let staging = ctx.staging_dir().join("standard-xlsm");
        assert!(!staging.exists());
    }

    #[test]
    fn test_missing_non_blank_target_fails() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "standard");
        // Rewrite the target as non-blank.
        std::fs::write(
            tmp.path().join("project.toml"),
            r#"[package]
name = "standard"
version = "0.1.0"

[[src]]
name = "Main"
path = "src/Main.bas"

[[targets]]
type = "xlsm"
"#,
        )
        .unwrap();

        let ctx = context(&tmp);
        let project = Project::load(tmp.path()).unwrap();
        let sources = SourceManager::new(&ctx);
        let graph = resolve_project(&ctx, &project, &sources).unwrap();
        let fetched = fetch_dependencies(&ctx, &sources, &graph).unwrap();
        let build_graph = BuildGraph::load(&ctx, &project, &graph, &fetched).unwrap();

        let bridge = MockBridge::new();
        let target = project.manifest.targets[0].clone();
        let err = build_target(
            &ctx,
            &bridge,
            &project,
            &build_graph,
            &target,
            &BuildOptions::default(),
        )
        .unwrap_err();

        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), "target-not-found");
    }
}
