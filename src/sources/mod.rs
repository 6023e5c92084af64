//! Package sources: registry, path, and git backends.

pub mod git;
pub mod manager;
pub mod path;
pub mod registry;

pub use git::GitSource;
pub use manager::SourceManager;
pub use path::PathSource;
pub use registry::RegistrySource;

use std::path::PathBuf;

use anyhow::Result;

use crate::core::{Dependency, Registration};

/// A source of registrations.
///
/// Backends are stateless handles over the cache directory; all caching is
/// on the filesystem, so `fetch` is idempotent across runs and safe to call
/// from rayon workers.
pub trait Source: Sync {
    /// Check if this source handles the given dependency.
    fn supports(&self, dep: &Dependency) -> bool;

    /// Enumerate candidate registrations satisfying the dependency.
    fn resolve(&self, dep: &Dependency) -> Result<Vec<Registration>>;

    /// Materialise the registration's source locally and return its
    /// directory.
    fn fetch(&self, registration: &Registration) -> Result<PathBuf>;

    /// Refresh any remote state (registry index). Default: nothing to do.
    fn update(&self) -> Result<()> {
        Ok(())
    }
}
