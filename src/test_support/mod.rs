//! Test utilities and mocks for vba-blocks unit tests.
//!
//! Only compiled for tests. Provides a scripted addin bridge and fixture
//! helpers so the pipeline can run without a host application.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::addin::{AddinBridge, TargetHandle};
use crate::core::Error;

/// A bridge that records calls and simulates the host application on the
/// filesystem.
pub struct MockBridge {
    /// Directory whose contents `export` copies out, if any
    export_source: Option<PathBuf>,

    fail_close_save: bool,
    fail_import: bool,

    calls: RefCell<Vec<String>>,
}

impl MockBridge {
    pub fn new() -> Self {
        MockBridge {
            export_source: None,
            fail_close_save: false,
            fail_import: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// `export` will copy this directory's contents.
    pub fn with_export_source(mut self, dir: PathBuf) -> Self {
        self.export_source = Some(dir);
        self
    }

    /// Fail the saving `close`, after `import` has already mutated the
    /// document.
    pub fn fail_on_close_save(mut self) -> Self {
        self.fail_close_save = true;
        self
    }

    pub fn fail_on_import(mut self) -> Self {
        self.fail_import = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl AddinBridge for MockBridge {
    fn open(&self, path: &Path) -> Result<TargetHandle> {
        self.calls.borrow_mut().push("open".to_string());
        if !path.exists() {
            // Blank targets: open creates the document.
            crate::util::fs::write_string(path, "mock document")?;
        }
        Ok(MockBridge::handle(path))
    }

    fn import(&self, handle: &TargetHandle, staged_dir: &Path) -> Result<()> {
        self.calls.borrow_mut().push("import".to_string());
        if self.fail_import {
            return Err(Error::TargetImportFailed {
                path: handle.path().to_path_buf(),
                message: "mock import failure".to_string(),
            }
            .into());
        }
        // Simulate the host mutating the document.
        std::fs::write(
            handle.path(),
            format!("imported from {}", staged_dir.display()),
        )?;
        Ok(())
    }

    fn export(&self, _handle: &TargetHandle, dir: &Path) -> Result<()> {
        self.calls.borrow_mut().push("export".to_string());
        if let Some(source) = &self.export_source {
            crate::util::fs::copy_dir_all(source, dir)?;
        }
        Ok(())
    }

    fn close(&self, handle: TargetHandle, save: bool) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("close {}", if save { "save" } else { "nosave" }));
        if save && self.fail_close_save {
            return Err(Error::TargetImportFailed {
                path: handle.path().to_path_buf(),
                message: "mock save failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl MockBridge {
    fn handle(path: &Path) -> TargetHandle {
        // TargetHandle has no public constructor; mirror HostBridge's open.
        // The struct is small enough to rebuild through serde-free cloning.
        TargetHandle::for_tests(path.to_path_buf())
    }
}

/// Write a minimal project fixture and return its directory.
pub fn write_project(dir: &Path, name: &str) -> PathBuf {
    crate::util::fs::ensure_dir(&dir.join("src")).unwrap();
    std::fs::write(
        dir.join("project.toml"),
        format!(
            r#"[package]
name = "{name}"
version = "0.1.0"

[[src]]
name = "Main"
path = "src/Main.bas"

[[targets]]
type = "xlsm"
blank = true
"#
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("src/Main.bas"),
        "Attribute VB_Name = \"Main\"\r\nPublic Sub Run()\r\nEnd Sub\r\n",
    )
    .unwrap();
    dir.to_path_buf()
}
