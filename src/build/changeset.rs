//! Changeset engine - diff a staged graph against the target's current
//! contents and apply the difference through the addin bridge.
//!
//! Apply order is strict: backup, removes, adds, changes, references,
//! save-and-close. The ordered plan is recorded in `changeset.toml` inside
//! the staging directory; the bridge executes it in one `import` call.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use crate::addin::AddinBridge;
use crate::build::graph::{BuildGraph, ImportGraph};
use crate::core::{Component, Error, Reference};
use crate::util::fs::{ensure_dir, ScopedDir};
use crate::util::GlobalContext;

/// The add/remove/change plan for one target.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub added: Vec<Component>,
    pub removed: Vec<Component>,
    pub changed: Vec<Component>,

    /// Full reference set after apply
    pub references: Vec<Reference>,

    /// Whether the reference set differs from the target's current one
    pub references_changed: bool,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && !self.references_changed
    }
}

/// Compute the changeset from the target's previous graph to the staged
/// import graph.
pub fn diff(previous: &BuildGraph, next: &ImportGraph) -> Result<Changeset> {
    let mut added = Vec::new();
    let mut changed = Vec::new();

    for component in &next.components {
        match previous.get(component.name()) {
            None => added.push(component.clone()),
            Some(existing) => {
                if component_differs(existing, component)? {
                    changed.push(component.clone());
                }
            }
        }
    }

    let removed = previous
        .components()
        .iter()
        .filter(|existing| {
            !next
                .components
                .iter()
                .any(|c| c.name() == existing.name())
        })
        .cloned()
        .collect();

    let references_changed = previous.references() != next.references.as_slice();

    Ok(Changeset {
        added,
        removed,
        changed,
        references: next.references.clone(),
        references_changed,
    })
}

fn component_differs(previous: &Component, next: &Component) -> Result<bool> {
    if previous.kind() != next.kind() || previous.code() != next.code() {
        return Ok(true);
    }
    Ok(previous.binary_bytes()? != next.binary_bytes()?)
}

/// Apply a changeset to the target document.
///
/// An empty changeset is a no-op. Otherwise the target file is backed up
/// first; any failure during apply closes the document without saving and
/// restores the backup. A failed restore is fatal and surfaces unchanged
/// as `target-restore-failed`.
pub fn apply_changeset(
    ctx: &GlobalContext,
    bridge: &dyn AddinBridge,
    target_path: &Path,
    staged: &ScopedDir,
    changeset: &Changeset,
) -> Result<()> {
    ctx.check_abort()?;

    if changeset.is_empty() {
        tracing::debug!("target {} is up to date", target_path.display());
        return Ok(());
    }

    write_changeset_manifest(staged.path(), changeset)?;

    let backup = backup_target(ctx, target_path)?;
    let handle = bridge.open(target_path)?;

    let applied = bridge
        .import(&handle, staged.path())
        .and_then(|_| bridge.close(handle.clone(), true));

    match applied {
        Ok(()) => {
            if let Some(backup) = backup {
                let _ = std::fs::remove_file(backup);
            }
            Ok(())
        }
        Err(err) => {
            let _ = bridge.close(handle, false);

            if let Some(backup) = &backup {
                if std::fs::copy(backup, target_path).is_err() {
                    return Err(Error::TargetRestoreFailed {
                        path: target_path.to_path_buf(),
                        backup: backup.clone(),
                    }
                    .into());
                }
            }

            Err(Error::TargetImportFailed {
                path: target_path.to_path_buf(),
                message: format!("{:#}", err),
            }
            .into())
        }
    }
}

/// Timestamped backup copy under `staging/backup/`; blank targets that do
/// not exist yet have nothing to back up.
fn backup_target(ctx: &GlobalContext, target_path: &Path) -> Result<Option<PathBuf>> {
    if !target_path.exists() {
        return Ok(None);
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs();
    let filename = target_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());

    let backup_dir = ctx.backup_dir();
    ensure_dir(&backup_dir)?;
    let backup = backup_dir.join(format!("{}-{}", timestamp, filename));
    std::fs::copy(target_path, &backup)?;

    Ok(Some(backup))
}

/// Record the ordered plan the bridge executes: removes, adds, changes,
/// then references.
fn write_changeset_manifest(staged_dir: &Path, changeset: &Changeset) -> Result<()> {
    let mut out = String::new();

    for component in &changeset.removed {
        out.push_str(&format!(
            "[[remove]]\nname = {:?}\ntype = {:?}\n\n",
            component.name(),
            component.kind().extension()
        ));
    }
    for component in &changeset.added {
        out.push_str(&format!(
            "[[add]]\nfile = {:?}\nname = {:?}\n\n",
            component.staged_filename(),
            component.name()
        ));
    }
    for component in &changeset.changed {
        out.push_str(&format!(
            "[[change]]\nfile = {:?}\nname = {:?}\n\n",
            component.staged_filename(),
            component.name()
        ));
    }
    for reference in &changeset.references {
        out.push_str(&format!(
            "[[reference]]\nguid = {:?}\nmajor = {}\nminor = {}\nname = {:?}\n\n",
            reference.guid, reference.major, reference.minor, reference.name
        ));
    }

    crate::util::fs::write_string(&staged_dir.join("changeset.toml"), &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Target, TargetKind};
    use crate::test_support::MockBridge;
    use tempfile::TempDir;

    fn graph_from(dir: &Path, files: &[(&str, &str)]) -> BuildGraph {
        for (filename, name) in files {
            std::fs::write(
                dir.join(filename),
                format!("Attribute VB_Name = \"{}\"\r\n", name),
            )
            .unwrap();
        }
        BuildGraph::from_dir(dir).unwrap()
    }

    fn import_from(graph: &BuildGraph) -> ImportGraph {
        let target = Target::new(TargetKind::Xlsm, "book", PathBuf::from("build"), false);
        graph.import_graph(&target)
    }

    #[test]
    fn test_diff_added_removed_changed() {
        let tmp = TempDir::new().unwrap();
        let prev_dir = tmp.path().join("prev");
        let next_dir = tmp.path().join("next");
        std::fs::create_dir_all(&prev_dir).unwrap();
        std::fs::create_dir_all(&next_dir).unwrap();

        let previous = graph_from(&prev_dir, &[("Old.bas", "Old"), ("Kept.bas", "Kept")]);
        // Kept changes its code body.
        std::fs::write(
            next_dir.join("Kept.bas"),
            "Attribute VB_Name = \"Kept\"\r\nSub New_()\r\nEnd Sub\r\n",
        )
        .unwrap();
        let next = graph_from(&next_dir, &[("Fresh.bas", "Fresh")]);

        let changeset = diff(&previous, &import_from(&next)).unwrap();

        let names = |cs: &[Component]| cs.iter().map(|c| c.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names(&changeset.added), vec!["Fresh"]);
        assert_eq!(names(&changeset.removed), vec!["Old"]);
        assert_eq!(names(&changeset.changed), vec!["Kept"]);
    }

    #[test]
    fn test_diff_symmetry() {
        let tmp = TempDir::new().unwrap();
        let a_dir = tmp.path().join("a");
        let b_dir = tmp.path().join("b");
        std::fs::create_dir_all(&a_dir).unwrap();
        std::fs::create_dir_all(&b_dir).unwrap();

        let a = graph_from(&a_dir, &[("OnlyA.bas", "OnlyA"), ("Both.bas", "Both")]);
        let b = graph_from(&b_dir, &[("OnlyB.bas", "OnlyB"), ("Both.bas", "Both")]);

        let forward = diff(&a, &import_from(&b)).unwrap();
        let backward = diff(&b, &import_from(&a)).unwrap();

        let names = |cs: &[Component]| cs.iter().map(|c| c.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names(&forward.added), names(&backward.removed));
        assert_eq!(names(&forward.removed), names(&backward.added));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("src");
        std::fs::create_dir_all(&dir).unwrap();
        let graph = graph_from(&dir, &[("Module1.bas", "Module1")]);

        let changeset = diff(&graph, &import_from(&graph)).unwrap();
        assert!(changeset.is_empty());
    }

    #[test]
    fn test_apply_empty_changeset_is_noop() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"));

        let bridge = MockBridge::new();
        let staged = ScopedDir::create(tmp.path().join("staged")).unwrap();
        let target = tmp.path().join("book.xlsm");
        std::fs::write(&target, "document").unwrap();

        apply_changeset(&ctx, &bridge, &target, &staged, &Changeset::default()).unwrap();
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_apply_failure_restores_backup() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"));

        let target = tmp.path().join("book.xlsm");
        std::fs::write(&target, "pristine bytes").unwrap();

        // The bridge mutates the document, then fails the saving close.
        let bridge = MockBridge::new().fail_on_close_save();
        let staged = ScopedDir::create(tmp.path().join("staged")).unwrap();

        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let next = graph_from(&src, &[("Module1.bas", "Module1")]);
        let changeset = diff(&BuildGraph::default(), &import_from(&next)).unwrap();

        let err = apply_changeset(&ctx, &bridge, &target, &staged, &changeset).unwrap_err();
        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), "target-import-failed");

        // File bytes equal the pre-build bytes.
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "pristine bytes");
        // Closed without saving after the failure.
        assert!(bridge.calls().contains(&"close nosave".to_string()));
    }

    #[test]
    fn test_apply_writes_ordered_plan() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"));

        let target = tmp.path().join("book.xlsm");
        std::fs::write(&target, "document").unwrap();

        let bridge = MockBridge::new();
        let staged = ScopedDir::create(tmp.path().join("staged")).unwrap();

        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let next = graph_from(&src, &[("Module1.bas", "Module1")]);
        let changeset = diff(&BuildGraph::default(), &import_from(&next)).unwrap();

        apply_changeset(&ctx, &bridge, &target, &staged, &changeset).unwrap();

        let plan = std::fs::read_to_string(staged.path().join("changeset.toml")).unwrap();
        assert!(plan.contains("[[add]]"));
        assert_eq!(
            bridge.calls(),
            vec!["open", "import", "close save"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }
}
