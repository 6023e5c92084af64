//! Registry source - packages published through a git-hosted index.
//!
//! The registry index is a git clone containing one TOML file per package
//! at `index/<first-two-chars>/<name>.toml`, each listing every published
//! version with its tarball URL, dependencies, and SHA-256 checksum.
//!
//! ```text
//! registry/
//! ├── index/
//! │   ├── di/
//! │   │   └── dictionary.toml
//! │   └── js/
//! │       └── json.toml
//! ```
//!
//! Fetched packages land in `sources/registry/<name>-<version>/`. The
//! tarball is downloaded to a temp path, verified against the index
//! checksum, extracted, and atomically renamed into the cache, so a
//! checksum failure never leaves anything behind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use git2::{Repository, ResetType};
use serde::Deserialize;
use url::Url;

use crate::core::dependency::DetailedDependencySpec;
use crate::core::{Dependency, Error, Registration, SourceUri};
use crate::sources::Source;
use crate::util::fs::{atomic_rename_dir, ensure_dir};
use crate::util::hash::sha256_bytes;

pub struct RegistrySource {
    /// Registry name from configuration (`default`, …)
    name: String,

    /// Git URL of the index
    index_url: Url,

    /// Local clone of the index
    index_dir: PathBuf,

    /// Where fetched packages live (`sources/registry`)
    packages_dir: PathBuf,
}

/// One package's index file.
#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    versions: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    version: String,

    /// `registry+<tarball-url>`
    source: String,

    #[serde(default)]
    dependencies: Vec<IndexDependency>,

    /// SHA-256 of the tarball, hex
    checksum: String,
}

#[derive(Debug, Deserialize)]
struct IndexDependency {
    name: String,

    #[serde(flatten)]
    spec: DetailedDependencySpec,
}

impl RegistrySource {
    pub fn new(name: impl Into<String>, index_url: Url, sources_dir: &Path) -> Self {
        let name = name.into();
        let packages_dir = sources_dir.join("registry");
        // Leading dot keeps the index clone out of the package namespace
        // (package names are kebab-case).
        let index_dir = packages_dir.join(".index").join(&name);

        RegistrySource {
            name,
            index_url,
            index_dir,
            packages_dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone the index if it is not present yet.
    fn ensure_index(&self) -> Result<()> {
        if self.index_dir.join(".git").exists() {
            return Ok(());
        }

        let _lock = self.index_lock()?;
        if self.index_dir.join(".git").exists() {
            return Ok(());
        }

        tracing::info!("cloning registry index {}", self.index_url);
        ensure_dir(self.index_dir.parent().expect("index dir has parent"))?;
        Repository::clone(self.index_url.as_str(), &self.index_dir)
            .with_context(|| format!("failed to clone registry index {}", self.index_url))?;
        Ok(())
    }

    /// Coarse lock serialising index clone/update across processes.
    fn index_lock(&self) -> Result<File> {
        let lock_path = self.index_dir.with_extension("lock");
        ensure_dir(lock_path.parent().expect("lock path has parent"))?;
        let file = File::create(&lock_path)
            .with_context(|| format!("failed to create lock {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        Ok(file)
    }

    /// Index file for a package: `index/<first-two-chars>/<name>.toml`.
    fn index_file(&self, name: &str) -> PathBuf {
        let shard = &name[..name.len().min(2)];
        self.index_dir
            .join("index")
            .join(shard)
            .join(format!("{}.toml", name))
    }

    fn load_index_entries(&self, name: &str) -> Result<Vec<IndexEntry>> {
        self.ensure_index()?;

        let path = self.index_file(name);
        if !path.exists() {
            return Err(Error::DependencyNotFound {
                name: name.to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read index file {}", path.display()))?;
        let index: IndexFile = toml::from_str(&content)
            .with_context(|| format!("malformed index file {}", path.display()))?;
        Ok(index.versions)
    }

    fn entry_to_registration(&self, name: &str, entry: &IndexEntry) -> Result<Registration> {
        let version = entry
            .version
            .parse()
            .with_context(|| format!("invalid version `{}` in index for `{}`", entry.version, name))?;

        let dependencies = entry
            .dependencies
            .iter()
            .map(|dep| {
                crate::core::dependency::DependencySpec::Detailed(dep.spec.clone())
                    .to_dependency(&dep.name, &self.index_dir)
                    .map_err(anyhow::Error::from)
            })
            .collect::<Result<Vec<Dependency>>>()?;

        Ok(Registration::new(
            name,
            version,
            SourceUri::registry(&self.name),
            dependencies,
            Some(entry.checksum.clone()),
        ))
    }

    /// Tarball URL for a registration, looked up from its index entry.
    fn tarball_url(&self, registration: &Registration) -> Result<String> {
        let entries = self.load_index_entries(registration.name())?;
        let version = registration.version().to_string();
        let entry = entries
            .iter()
            .find(|e| e.version == version)
            .ok_or_else(|| Error::DependencyNotFound {
                name: registration.name().to_string(),
            })?;

        let uri = SourceUri::parse(&entry.source)?;
        if !uri.is_registry() {
            return Err(Error::DependencyUnknownSource {
                name: registration.name().to_string(),
                source_value: entry.source.clone(),
            }
            .into());
        }
        Ok(uri.value().to_string())
    }

    fn download(url: &str) -> Result<Vec<u8>> {
        let failed = |message: String| Error::SourceDownloadFailed {
            url: url.to_string(),
            message,
        };

        // Redirects (3xx) are followed by the client; 4xx/5xx fail here.
        let response = reqwest::blocking::get(url).map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())).into());
        }

        let bytes = response.bytes().map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn extract_tarball(data: &[u8], dest: &Path) -> Result<()> {
        use flate2::read::GzDecoder;
        use tar::Archive;

        let mut archive = Archive::new(GzDecoder::new(data));
        archive
            .unpack(dest)
            .context("failed to extract tarball")?;
        Ok(())
    }
}

impl Source for RegistrySource {
    fn supports(&self, dep: &Dependency) -> bool {
        matches!(dep, Dependency::Registry { registry, .. } if *registry == self.name)
    }

    fn resolve(&self, dep: &Dependency) -> Result<Vec<Registration>> {
        let Dependency::Registry { name, .. } = dep else {
            return Ok(vec![]);
        };

        let entries = self.load_index_entries(name)?;
        entries
            .iter()
            .map(|entry| self.entry_to_registration(name, entry))
            .collect()
    }

    fn fetch(&self, registration: &Registration) -> Result<PathBuf> {
        let dest = self
            .packages_dir
            .join(format!("{}-{}", registration.name(), registration.version()));

        // Idempotent across runs
        if dest.exists() {
            return Ok(dest);
        }

        // Per-entry writer exclusion; contenders wait.
        let lock_path = dest.with_extension("lock");
        ensure_dir(&self.packages_dir)?;
        let lock_file = File::create(&lock_path)?;
        lock_file.lock_exclusive()?;
        if dest.exists() {
            return Ok(dest);
        }

        let url = self.tarball_url(registration)?;
        tracing::info!("downloading {}", url);
        let bytes = Self::download(&url)?;

        // Verify before anything is written into the cache.
        let expected = registration
            .checksum()
            .ok_or_else(|| Error::DependencyUnknownSource {
                name: registration.name().to_string(),
                source_value: registration.source().to_string(),
            })?;
        let actual = sha256_bytes(&bytes);
        if actual != expected {
            return Err(Error::DependencyInvalidChecksum {
                name: registration.name().to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }

        let staging = tempfile::tempdir_in(&self.packages_dir)
            .context("failed to create extraction directory")?;
        Self::extract_tarball(&bytes, staging.path())?;
        atomic_rename_dir(&staging.into_path(), &dest)?;

        Ok(dest)
    }

    fn update(&self) -> Result<()> {
        self.ensure_index()?;

        let _lock = self.index_lock()?;
        tracing::info!("updating registry index {}", self.index_url);

        let repo = Repository::open(&self.index_dir).context("failed to open registry index")?;
        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&["refs/heads/*:refs/heads/*"], None, None)?;

        let head = repo.head()?;
        let commit = head.peel_to_commit()?;
        repo.reset(commit.as_object(), ResetType::Hard, None)?;

        Ok(())
    }
}

/// Write an index entry file; used by tests and registry tooling.
pub fn write_index_entry(
    index_dir: &Path,
    name: &str,
    entries: &str,
) -> Result<()> {
    let shard = &name[..name.len().min(2)];
    let dir = index_dir.join("index").join(shard);
    ensure_dir(&dir)?;
    let mut file = File::create(dir.join(format!("{}.toml", name)))?;
    file.write_all(entries.as_bytes())?;
    Ok(())
}
