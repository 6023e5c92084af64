//! The export pipeline.
//!
//! Pull the target document's components back into the project's `src/`
//! tree, patching the manifest's `[[src]]` entries with byte-minimal
//! edits.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::addin::{locate_bridge, AddinBridge};
use crate::build::BuildGraph;
use crate::core::{Error, Project};
use crate::ops::patch;
use crate::util::fs::ScopedDir;
use crate::util::GlobalContext;

#[derive(Debug, Default)]
pub struct ExportOptions {
    /// Export the matching target (type or name)
    pub target: Option<String>,

    /// Re-fold an already-exported directory instead of driving the bridge
    pub completed: Option<PathBuf>,

    /// Explicit bridge script
    pub addin: Option<PathBuf>,
}

pub fn export(ctx: &GlobalContext, options: &ExportOptions) -> Result<()> {
    let project = Project::load(ctx.cwd())?;
    if project.manifest.targets.is_empty() {
        return Err(Error::ExportNoTarget.into());
    }

    let target = project.manifest.select_target(options.target.as_deref())?;
    let target_path = target.file_path(project.dir());

    match &options.completed {
        Some(dir) => {
            let exported = BuildGraph::from_dir(dir)?;
            refold(&project, &exported)
        }
        None => {
            if !target_path.exists() {
                return Err(Error::TargetNotFound { path: target_path }.into());
            }

            let bridge = locate_bridge(ctx.cache_root(), options.addin.as_deref())?;
            let export_dir = ScopedDir::create(
                ctx.staging_dir()
                    .join(format!("{}-{}-export", target.name, target.kind)),
            )?;

            let handle = bridge.open(&target_path)?;
            let exported = bridge.export(&handle, export_dir.path());
            bridge.close(handle, false)?;
            exported?;

            ctx.check_abort()?;
            let exported = BuildGraph::from_dir(export_dir.path())?;
            refold(&project, &exported)
        }
    }
}

/// Fold exported components back into `src/`, patching the manifest.
fn refold(project: &Project, exported: &BuildGraph) -> Result<()> {
    let manifest = &project.manifest;
    let manifest_path = manifest.manifest_path();
    let src_dir = project.dir().join("src");
    crate::util::fs::ensure_dir(&src_dir)?;

    for component in exported.components() {
        let filename = component.staged_filename();
        let dest = src_dir.join(&filename);
        crate::util::fs::write_string(&dest, component.code())?;

        let binary_rel = match component.binary_path() {
            Some(binary) => {
                let ext = binary
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("frx");
                let binary_name = format!("{}.{}", component.name(), ext);
                std::fs::copy(binary, src_dir.join(&binary_name))?;
                Some(format!("src/{}", binary_name))
            }
            None => None,
        };

        if !manifest.src.iter().any(|s| s.name == component.name()) {
            patch::add_source(
                &manifest_path,
                component.name(),
                &format!("src/{}", filename),
                binary_rel.as_deref(),
            )?;
            tracing::info!("added `{}` to project src", component.name());
        }
    }

    // Components that vanished from the target leave the project too.
    for entry in &manifest.src {
        if exported.get(&entry.name).is_none() {
            remove_entry_files(project.dir(), entry)?;
            patch::remove_source(&manifest_path, &entry.name)?;
            tracing::info!("removed `{}` from project src", entry.name);
        }
    }

    Ok(())
}

fn remove_entry_files(dir: &Path, entry: &crate::core::manifest::SrcEntry) -> Result<()> {
    let path = entry.resolved_path(dir);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    if let Some(binary) = entry.resolved_binary(dir) {
        if binary.exists() {
            std::fs::remove_file(&binary)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Manifest;
    use crate::test_support::write_project;
    use tempfile::TempDir;

    #[test]
    fn test_refold_adds_and_removes_sources() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "standard");
        let project = Project::load(tmp.path()).unwrap();

        // The exported document kept Main, gained Helper, and the manifest
        // has a stale entry for a module the user deleted in the host.
        patch::add_source(
            &project.manifest.manifest_path(),
            "Stale",
            "src/Stale.bas",
            None,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("src/Stale.bas"),
            "Attribute VB_Name = \"Stale\"\r\n",
        )
        .unwrap();
        let project = Project::load(tmp.path()).unwrap();

        let exported_dir = tmp.path().join("exported");
        std::fs::create_dir_all(&exported_dir).unwrap();
        std::fs::write(
            exported_dir.join("Main.bas"),
            "Attribute VB_Name = \"Main\"\r\nPublic Sub Run()\r\nEnd Sub\r\n",
        )
        .unwrap();
        std::fs::write(
            exported_dir.join("Helper.cls"),
            "Attribute VB_Name = \"Helper\"\r\n",
        )
        .unwrap();

        let exported = BuildGraph::from_dir(&exported_dir).unwrap();
        refold(&project, &exported).unwrap();

        let manifest = Manifest::load(tmp.path()).unwrap();
        let names: Vec<_> = manifest.src.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Main"));
        assert!(names.contains(&"Helper"));
        assert!(!names.contains(&"Stale"));

        assert!(tmp.path().join("src/Helper.cls").exists());
        assert!(!tmp.path().join("src/Stale.bas").exists());
    }

    #[test]
    fn test_export_requires_targets() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("project.toml"),
            "[package]\nname = \"bare\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"));

        let err = export(&ctx, &ExportOptions::default()).unwrap_err();
        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), "export-no-target");
    }
}
