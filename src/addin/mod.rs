//! Addin bridge - the interface to the host application.
//!
//! The core never touches Office documents itself; it drives an opaque
//! bridge with four calls. The shipped implementation shells out to a
//! platform script, and tests substitute a mock.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;

use crate::core::Error;

/// An open target document.
#[derive(Debug, Clone)]
pub struct TargetHandle {
    path: PathBuf,
}

impl TargetHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn for_tests(path: PathBuf) -> Self {
        TargetHandle { path }
    }
}

/// The four-call bridge contract.
///
/// `open` on a missing file creates a fresh document of the target's type
/// (that is how blank targets come to exist). Each call surfaces its
/// failure as the matching `target-*` error kind.
pub trait AddinBridge {
    fn open(&self, path: &Path) -> Result<TargetHandle>;

    /// Apply the staged changeset directory to the open document.
    fn import(&self, handle: &TargetHandle, staged_dir: &Path) -> Result<()>;

    /// Export the document's current components into `dir`.
    fn export(&self, handle: &TargetHandle, dir: &Path) -> Result<()>;

    fn close(&self, handle: TargetHandle, save: bool) -> Result<()>;
}

/// Bridge driving the host application through a script.
///
/// The script receives `<action> <target> [dir|save|nosave]` and reports
/// through its exit code; exit code 10 means the target is already open in
/// the host application.
pub struct HostBridge {
    script: PathBuf,
}

const EXIT_TARGET_OPEN: i32 = 10;

impl HostBridge {
    pub fn new(script: PathBuf) -> Self {
        HostBridge { script }
    }

    fn command(&self) -> Command {
        match self.script.extension().and_then(|e| e.to_str()) {
            Some("vbs") => {
                let mut cmd = Command::new("cscript");
                cmd.arg("//Nologo").arg(&self.script);
                cmd
            }
            Some("scpt") => {
                let mut cmd = Command::new("osascript");
                cmd.arg(&self.script);
                cmd
            }
            _ => Command::new(&self.script),
        }
    }

    fn run(&self, args: &[&str]) -> Result<(), BridgeFailure> {
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| BridgeFailure::Message(e.to_string()))?;

        if output.status.success() {
            return Ok(());
        }
        if output.status.code() == Some(EXIT_TARGET_OPEN) {
            return Err(BridgeFailure::TargetOpen);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(BridgeFailure::Message(if stderr.is_empty() {
            format!("bridge exited with {}", output.status)
        } else {
            stderr
        }))
    }
}

enum BridgeFailure {
    TargetOpen,
    Message(String),
}

impl AddinBridge for HostBridge {
    fn open(&self, path: &Path) -> Result<TargetHandle> {
        let path_str = path.to_string_lossy();
        self.run(&["open", &path_str]).map_err(|failure| match failure {
            BridgeFailure::TargetOpen => Error::TargetIsOpen {
                path: path.to_path_buf(),
            },
            BridgeFailure::Message(message) => Error::TargetCreateFailed {
                path: path.to_path_buf(),
                message,
            },
        })?;

        Ok(TargetHandle {
            path: path.to_path_buf(),
        })
    }

    fn import(&self, handle: &TargetHandle, staged_dir: &Path) -> Result<()> {
        let path_str = handle.path.to_string_lossy();
        let dir_str = staged_dir.to_string_lossy();
        self.run(&["import", &path_str, &dir_str])
            .map_err(|failure| match failure {
                BridgeFailure::TargetOpen => Error::TargetIsOpen {
                    path: handle.path.clone(),
                },
                BridgeFailure::Message(message) => Error::TargetImportFailed {
                    path: handle.path.clone(),
                    message,
                },
            })?;
        Ok(())
    }

    fn export(&self, handle: &TargetHandle, dir: &Path) -> Result<()> {
        let path_str = handle.path.to_string_lossy();
        let dir_str = dir.to_string_lossy();
        self.run(&["export", &path_str, &dir_str])
            .map_err(|failure| match failure {
                BridgeFailure::TargetOpen => Error::TargetIsOpen {
                    path: handle.path.clone(),
                },
                BridgeFailure::Message(message) => Error::ExportFailed {
                    path: handle.path.clone(),
                    message,
                },
            })?;
        Ok(())
    }

    fn close(&self, handle: TargetHandle, save: bool) -> Result<()> {
        let path_str = handle.path.to_string_lossy();
        let save_arg = if save { "save" } else { "nosave" };
        self.run(&["close", &path_str, save_arg])
            .map_err(|failure| match failure {
                BridgeFailure::TargetOpen => Error::TargetIsOpen {
                    path: handle.path.clone(),
                },
                BridgeFailure::Message(message) => Error::TargetImportFailed {
                    path: handle.path.clone(),
                    message,
                },
            })?;
        Ok(())
    }
}

/// Locate the bridge script: explicit `--addin` wins, then the installed
/// bridge in the cache root.
pub fn locate_bridge(cache_root: &Path, addin: Option<&Path>) -> Result<HostBridge> {
    if let Some(path) = addin {
        if !path.exists() {
            anyhow::bail!("addin bridge not found at {}", path.display());
        }
        return Ok(HostBridge::new(path.to_path_buf()));
    }

    let addin_dir = cache_root.join("addin");
    let candidates = ["bridge.vbs", "bridge.scpt", "bridge.sh"];
    for name in candidates {
        let path = addin_dir.join(name);
        if path.exists() {
            return Ok(HostBridge::new(path));
        }
    }

    anyhow::bail!(
        "no addin bridge installed under {}; pass --addin PATH",
        addin_dir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_explicit_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = locate_bridge(tmp.path(), Some(&tmp.path().join("nope.sh")));
        assert!(result.is_err());
    }

    #[test]
    fn test_locate_installed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let addin_dir = tmp.path().join("addin");
        std::fs::create_dir_all(&addin_dir).unwrap();
        std::fs::write(addin_dir.join("bridge.sh"), "#!/bin/sh\nexit 0\n").unwrap();

        assert!(locate_bridge(tmp.path(), None).is_ok());
    }
}
