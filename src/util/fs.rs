//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Recursively copy a directory.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory: {}", dst.display()))?;

    for entry in fs::read_dir(src)
        .with_context(|| format!("failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists and is empty.
pub fn ensure_empty_dir(path: &Path) -> Result<()> {
    remove_dir_all_if_exists(path)?;
    ensure_dir(path)
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Write bytes to a sibling temp file, then atomically rename into place.
///
/// Readers never observe a partially written file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    ensure_dir(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    std::io::Write::write_all(&mut tmp, contents)?;
    tmp.persist(path)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}

/// Atomically rename a fully-populated directory into place.
///
/// The destination must not exist; the source must be on the same filesystem.
pub fn atomic_rename_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::rename(src, dst)
        .with_context(|| format!("failed to move {} to {}", src.display(), dst.display()))
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Render `path` relative to `base` with forward slashes and a trailing slash.
///
/// This is the lockfile representation of a path source: stable across
/// machines and operating systems.
pub fn posix_relative_dir(base: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    let mut s = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// A directory whose lifetime is scoped to an action invocation.
///
/// Created on entry, removed on drop regardless of how the action exits.
/// Cleanup failures are logged, never surfaced, so they cannot mask the
/// error that unwound the action.
pub struct ScopedDir {
    path: PathBuf,
    keep: bool,
}

impl ScopedDir {
    /// Create (or empty) the directory at `path` and take ownership of it.
    pub fn create(path: PathBuf) -> Result<Self> {
        ensure_empty_dir(&path)?;
        Ok(ScopedDir { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the directory without removing it.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.path) {
            if self.path.exists() {
                tracing::warn!("failed to clean up {}: {}", self.path.display(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("file.txt"), "content").unwrap();
        fs::write(src.join("nested/inner.txt"), "inner").unwrap();

        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("file.txt")).unwrap(), "content");
        assert_eq!(
            fs::read_to_string(dst.join("nested/inner.txt")).unwrap(),
            "inner"
        );
    }

    #[test]
    fn test_atomic_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sub").join("out.txt");

        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        atomic_write(&path, b"world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "world");
    }

    #[test]
    fn test_posix_relative_dir() {
        let base = Path::new("/home/user/project");
        let path = Path::new("/home/user/packages/dictionary");

        assert_eq!(posix_relative_dir(base, path), "../packages/dictionary/");
    }

    #[test]
    fn test_scoped_dir_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("staging");

        {
            let dir = ScopedDir::create(path.clone()).unwrap();
            fs::write(dir.path().join("file"), "x").unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_scoped_dir_keep() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("staging");

        {
            let dir = ScopedDir::create(path.clone()).unwrap();
            dir.keep();
        }

        assert!(path.exists());
    }

    #[test]
    fn test_ensure_empty_dir_clears_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dir");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("stale"), "x").unwrap();

        ensure_empty_dir(&path).unwrap();

        assert!(path.exists());
        assert!(!path.join("stale").exists());
    }
}
