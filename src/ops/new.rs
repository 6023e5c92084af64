//! Scaffold a new project.

use anyhow::Result;

use crate::core::manifest::generate_project_manifest;
use crate::core::{Error, TargetKind};
use crate::util::GlobalContext;

#[derive(Debug)]
pub struct NewOptions {
    pub name: String,

    /// Target type for the scaffolded project (default `xlsm`)
    pub target: Option<String>,
}

pub fn new_project(ctx: &GlobalContext, options: &NewOptions) -> Result<()> {
    let name = &options.name;
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        || !name.starts_with(|c: char| c.is_ascii_lowercase())
    {
        return Err(Error::NewInvalidName {
            name: name.clone(),
            message: "use lowercase kebab-case (letters, digits, dashes)".to_string(),
        }
        .into());
    }

    let kind: TargetKind = options.target.as_deref().unwrap_or("xlsm").parse()?;

    let dir = ctx.cwd().join(name);
    if dir.exists() {
        return Err(Error::NewDirExists { path: dir }.into());
    }

    crate::util::fs::ensure_dir(&dir.join("src"))?;
    crate::util::fs::write_string(
        &dir.join("project.toml"),
        &generate_project_manifest(name, kind),
    )?;
    crate::util::fs::write_string(
        &dir.join("src").join("Main.bas"),
        "Attribute VB_Name = \"Main\"\r\nOption Explicit\r\n\r\nPublic Sub Main()\r\n    ' TODO\r\nEnd Sub\r\n",
    )?;
    crate::util::fs::write_string(&dir.join(".gitignore"), "/build\n")?;

    tracing::info!("created project `{}`", name);
    Ok(())
}
