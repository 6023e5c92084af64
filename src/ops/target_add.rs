//! The target-add pipeline: register a new target in the manifest and
//! build it once.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::{Error, Project, TargetKind};
use crate::ops::build::{build, BuildOptions};
use crate::ops::patch;
use crate::util::GlobalContext;

#[derive(Debug, Default)]
pub struct TargetAddOptions {
    /// Target type (`xlsm`, `xlam`)
    pub kind: Option<String>,

    /// Seed the target from an existing document
    pub from: Option<PathBuf>,

    /// Target name (defaults to the package name)
    pub name: Option<String>,

    /// Output directory (defaults to `build`)
    pub path: Option<PathBuf>,

    /// Explicit bridge script
    pub addin: Option<PathBuf>,
}

pub fn target_add(ctx: &GlobalContext, options: &TargetAddOptions) -> Result<()> {
    let kind: TargetKind = options
        .kind
        .as_deref()
        .ok_or(Error::TargetAddNoType)?
        .parse()?;

    let project = Project::load(ctx.cwd())?;
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| project.manifest.name.clone());
    let out_dir = options
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from("build"));

    if project.manifest.targets.iter().any(|t| t.name == name && t.kind == kind) {
        return Err(Error::ManifestInvalid {
            path: project.manifest.manifest_path(),
            message: format!("target `{}.{}` already exists", name, kind),
        }
        .into());
    }

    // Seed from --from, else start blank.
    let blank = match &options.from {
        Some(from) => {
            if !from.exists() {
                return Err(Error::FromNotFound { path: from.clone() }.into());
            }
            let dest_dir = project.dir().join(&out_dir);
            crate::util::fs::ensure_dir(&dest_dir)?;
            let dest = dest_dir.join(format!("{}.{}", name, kind.extension()));
            std::fs::copy(from, &dest).map_err(|e| Error::TargetCreateFailed {
                path: dest.clone(),
                message: e.to_string(),
            })?;
            false
        }
        None => true,
    };

    patch::add_target(
        &project.manifest.manifest_path(),
        kind.extension(),
        options.name.as_deref(),
        options.path.as_ref().map(|p| p.to_string_lossy()).as_deref(),
        blank,
    )?;
    tracing::info!("added target `{}.{}`", name, kind);

    // Build the new target once.
    build(
        ctx,
        &BuildOptions {
            target: Some(name),
            addin: options.addin.clone(),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Manifest;
    use tempfile::TempDir;

    fn context(tmp: &TempDir) -> GlobalContext {
        GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_cache_root(tmp.path().join("cache"))
    }

    #[test]
    fn test_missing_type_fails() {
        let tmp = TempDir::new().unwrap();
        crate::test_support::write_project(tmp.path(), "standard");
        let ctx = context(&tmp);

        let err = target_add(&ctx, &TargetAddOptions::default()).unwrap_err();
        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), "target-add-no-type");
    }

    #[test]
    fn test_from_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("project.toml"),
            "[package]\nname = \"bare\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let ctx = context(&tmp);

        let err = target_add(
            &ctx,
            &TargetAddOptions {
                kind: Some("xlsm".to_string()),
                from: Some(tmp.path().join("missing.xlsm")),
                ..Default::default()
            },
        )
        .unwrap_err();

        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), "from-not-found");
    }

    #[test]
    fn test_manifest_patched_before_build() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("project.toml"),
            "[package]\nname = \"bare\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let ctx = context(&tmp);

        // The build step fails (no bridge installed), but the manifest
        // patch has already landed.
        let _ = target_add(
            &ctx,
            &TargetAddOptions {
                kind: Some("xlam".to_string()),
                ..Default::default()
            },
        );

        let manifest = Manifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.targets.len(), 1);
        assert_eq!(manifest.targets[0].kind, TargetKind::Xlam);
        assert!(manifest.targets[0].blank);
    }
}
