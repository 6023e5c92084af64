//! Run a project automation script through the host.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};

use crate::core::Error;
use crate::util::GlobalContext;

#[derive(Debug)]
pub struct RunOptions {
    /// Script name (looked up in `scripts/`) or a direct path
    pub script: String,

    /// Extra arguments handed to the script
    pub args: Vec<String>,
}

pub fn run_script(ctx: &GlobalContext, options: &RunOptions) -> Result<()> {
    let path = locate_script(ctx, &options.script)?;

    let mut command = match path.extension().and_then(|e| e.to_str()) {
        Some("vbs") => {
            let mut cmd = Command::new("cscript");
            cmd.arg("//Nologo").arg(&path);
            cmd
        }
        Some("scpt") => {
            let mut cmd = Command::new("osascript");
            cmd.arg(&path);
            cmd
        }
        _ => Command::new(&path),
    };

    let status = command
        .args(&options.args)
        .current_dir(ctx.cwd())
        .status()
        .with_context(|| format!("failed to run {}", path.display()))?;

    if !status.success() {
        anyhow::bail!("script {} exited with {}", path.display(), status);
    }
    Ok(())
}

fn locate_script(ctx: &GlobalContext, script: &str) -> Result<PathBuf, Error> {
    let direct = ctx.cwd().join(script);
    if direct.is_file() {
        return Ok(direct);
    }

    let scripts_dir = ctx.cwd().join("scripts");
    for ext in ["vbs", "scpt", "sh"] {
        let candidate = scripts_dir.join(format!("{}.{}", script, ext));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(Error::RunScriptNotFound { path: direct })
}
