//! Global context for vba-blocks operations.
//!
//! An explicit context value threaded through every action: paths,
//! configuration, the abort flag, and the progress reporter. There are no
//! hidden singletons.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::util::config::{Config, DEFAULT_REGISTRY_URL};
use crate::util::progress::Reporter;

/// Global context containing configuration, paths, and cancellation state.
#[derive(Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Cache root (sources/ and staging/ live underneath)
    cache_root: PathBuf,

    /// Default registry index URL
    registry_url: Url,

    /// Global configuration (named registries)
    config: Config,

    /// Cooperative cancellation flag
    abort: Arc<AtomicBool>,

    /// Progress reporter
    reporter: Reporter,
}

impl GlobalContext {
    /// Create a context rooted at the current directory, honouring
    /// `VBA_BLOCKS_HOME` and `VBA_BLOCKS_REGISTRY`.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context with an explicit working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let cache_root = match std::env::var_os("VBA_BLOCKS_HOME") {
            Some(home) => PathBuf::from(home),
            None => default_cache_root()?,
        };

        let registry_url = match std::env::var("VBA_BLOCKS_REGISTRY") {
            Ok(url) => url
                .parse()
                .with_context(|| format!("invalid VBA_BLOCKS_REGISTRY: {}", url))?,
            Err(_) => DEFAULT_REGISTRY_URL.parse().expect("default registry URL"),
        };

        let config = Config::load(&cache_root.join("config.toml"), &registry_url)?;

        Ok(GlobalContext {
            cwd,
            cache_root,
            registry_url,
            config,
            abort: Arc::new(AtomicBool::new(false)),
            reporter: Reporter::silent(),
        })
    }

    /// Replace the progress reporter.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Redirect the cache root, e.g. to a sandbox in tests.
    pub fn with_cache_root(mut self, cache_root: PathBuf) -> Self {
        self.cache_root = cache_root;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the cache root.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Directory for fetched dependency sources.
    pub fn sources_dir(&self) -> PathBuf {
        self.cache_root.join("sources")
    }

    /// Directory for staged builds.
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_root.join("staging")
    }

    /// Directory for target backups taken before a changeset apply.
    pub fn backup_dir(&self) -> PathBuf {
        self.staging_dir().join("backup")
    }

    /// The default registry index URL.
    pub fn registry_url(&self) -> &Url {
        &self.registry_url
    }

    /// Global configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Progress reporter.
    pub fn reporter(&self) -> Reporter {
        self.reporter.clone()
    }

    /// Handle that other threads (e.g. a ctrl-c handler) can use to abort.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Cooperative cancellation checkpoint; placed between pipeline stages
    /// and fan-out batches.
    pub fn check_abort(&self) -> Result<()> {
        if self.abort.load(Ordering::Relaxed) {
            bail!("operation aborted");
        }
        Ok(())
    }
}

/// Platform cache root for vba-blocks.
fn default_cache_root() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let local = std::env::var_os("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set")?;
        Ok(PathBuf::from(local).join("vba-blocks"))
    }

    #[cfg(target_os = "macos")]
    {
        let home = dirs::home_dir().context("home directory not found")?;
        Ok(home
            .join("Library")
            .join("Group Containers")
            .join("UBF8T346G9.Office")
            .join(".vba-blocks"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let cache = dirs::cache_dir().context("cache directory not found")?;
        Ok(cache.join("vba-blocks"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();

        assert_eq!(ctx.cwd(), tmp.path());
        assert!(ctx.sources_dir().ends_with("sources"));
        assert!(ctx.staging_dir().ends_with("staging"));
        assert!(ctx.backup_dir().starts_with(ctx.staging_dir()));
    }

    #[test]
    fn test_abort_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();

        assert!(ctx.check_abort().is_ok());
        ctx.abort_flag().store(true, Ordering::Relaxed);
        assert!(ctx.check_abort().is_err());
    }
}
