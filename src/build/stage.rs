//! Stager - materialise an ImportGraph into the staging area.

use anyhow::Result;
use rayon::prelude::*;

use crate::build::graph::ImportGraph;
use crate::util::fs::ScopedDir;
use crate::util::GlobalContext;

/// Write all components (and binary sidecars) of an import graph into a
/// target-specific staging directory.
///
/// The directory is emptied first and owned by the returned [`ScopedDir`],
/// so it disappears with the action on every exit path. Writes fan out;
/// each component targets a disjoint path.
pub fn stage_import_graph(ctx: &GlobalContext, import: &ImportGraph) -> Result<ScopedDir> {
    ctx.check_abort()?;

    let dir_name = format!("{}-{}", import.target.name, import.target.kind);
    let staged = ScopedDir::create(ctx.staging_dir().join(dir_name))?;

    let reporter = ctx.reporter();
    import
        .components
        .par_iter()
        .try_for_each(|component| -> Result<()> {
            ctx.check_abort()?;

            let dest = staged.path().join(component.staged_filename());
            crate::util::fs::write_string(&dest, component.code())?;

            if let Some(binary) = component.binary_path() {
                let ext = binary
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("frx");
                let binary_dest = staged
                    .path()
                    .join(format!("{}.{}", component.name(), ext));
                std::fs::copy(binary, binary_dest)?;
            }

            reporter.tick(component.name());
            Ok(())
        })?;

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildGraph;
    use crate::core::{Target, TargetKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_staging_writes_components_and_sidecars() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"));

        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Module1.bas"), "Attribute VB_Name = \"Module1\"\r\n").unwrap();
        std::fs::write(src.join("Form1.frm"), "Attribute VB_Name = \"Form1\"\r\n").unwrap();
        std::fs::write(src.join("Form1.frx"), [1u8, 2, 3]).unwrap();

        let graph = BuildGraph::from_dir(&src).unwrap();
        let target = Target::new(TargetKind::Xlsm, "book", PathBuf::from("build"), true);
        let import = graph.import_graph(&target);

        let staged = stage_import_graph(&ctx, &import).unwrap();
        assert!(staged.path().join("Module1.bas").exists());
        assert!(staged.path().join("Form1.frm").exists());
        assert_eq!(
            std::fs::read(staged.path().join("Form1.frx")).unwrap(),
            vec![1u8, 2, 3]
        );

        // Stale content from a previous run is cleared on re-stage.
        std::fs::write(staged.path().join("Stale.bas"), "x").unwrap();
        drop(staged);
        let staged = stage_import_graph(&ctx, &import).unwrap();
        assert!(!staged.path().join("Stale.bas").exists());
    }
}
