//! Git source - dependencies from git repositories.
//!
//! `resolve` clones the repository, checks out the requested ref, and pins
//! the registration to the resolved commit. Checkouts are content-addressed
//! under `sources/git/<host>/<repo>@<commit>/`, so `fetch` is idempotent.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, ResetType};
use url::Url;

use crate::core::{Dependency, Error, GitReference, Manifest, Registration, SourceUri};
use crate::sources::Source;
use crate::util::fs::{atomic_rename_dir, ensure_dir, remove_dir_all_if_exists};

pub struct GitSource {
    /// Root for git checkouts (`<cache>/sources/git`)
    cache_dir: PathBuf,
}

impl GitSource {
    pub fn new(sources_dir: &Path) -> Self {
        GitSource {
            cache_dir: sources_dir.join("git"),
        }
    }

    /// Checkout directory for a repository pinned to a commit.
    fn checkout_dir(&self, url: &Url, rev: &str) -> PathBuf {
        let host = url.host_str().unwrap_or("localhost");
        let repo = url
            .path()
            .trim_matches('/')
            .replace('/', "-")
            .trim_end_matches(".git")
            .to_string();
        let short = &rev[..rev.len().min(12)];
        self.cache_dir.join(host).join(format!("{}@{}", repo, short))
    }

    fn checkout_reference(repo: &Repository, reference: &GitReference) -> Result<String> {
        let commit = match reference {
            GitReference::Branch(branch) => repo
                .find_reference(&format!("refs/remotes/origin/{}", branch))
                .or_else(|_| repo.find_reference(&format!("refs/heads/{}", branch)))
                .with_context(|| format!("branch `{}` not found", branch))?
                .peel_to_commit()?,
            GitReference::Tag(tag) => repo
                .find_reference(&format!("refs/tags/{}", tag))
                .with_context(|| format!("tag `{}` not found", tag))?
                .peel_to_commit()?,
            GitReference::Rev(rev) => {
                let oid = git2::Oid::from_str(rev)?;
                repo.find_commit(oid)?
            }
        };

        let rev = commit.id().to_string();
        repo.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(rev)
    }

    fn ensure_checkout(&self, url: &Url, rev: &str) -> Result<PathBuf> {
        let dest = self.checkout_dir(url, rev);
        if dest.join(".git").exists() {
            return Ok(dest);
        }

        let staging = self.clone_to_staging(url)?;
        let repo = Repository::open(&staging)?;
        Self::checkout_reference(&repo, &GitReference::Rev(rev.to_string()))?;
        drop(repo);

        self.commit_checkout(staging, &dest)
    }

    /// Clone into a temp directory next to the final location.
    fn clone_to_staging(&self, url: &Url) -> Result<PathBuf> {
        ensure_dir(&self.cache_dir)?;
        let staging = tempfile::tempdir_in(&self.cache_dir)
            .context("failed to create git staging directory")?
            .into_path();

        tracing::info!("cloning {}", url);
        Repository::clone(url.as_str(), &staging)
            .with_context(|| format!("failed to clone {}", url))?;

        Ok(staging)
    }

    /// Move a finished checkout into its content-addressed home.
    fn commit_checkout(&self, staging: PathBuf, dest: &Path) -> Result<PathBuf> {
        if dest.exists() {
            // Lost the race to another process; its copy is equivalent.
            remove_dir_all_if_exists(&staging)?;
        } else {
            atomic_rename_dir(&staging, dest)?;
        }
        Ok(dest.to_path_buf())
    }
}

impl Source for GitSource {
    fn supports(&self, dep: &Dependency) -> bool {
        dep.is_git()
    }

    fn resolve(&self, dep: &Dependency) -> Result<Vec<Registration>> {
        let Dependency::Git {
            name,
            url,
            reference,
            ..
        } = dep
        else {
            return Ok(vec![]);
        };

        let staging = self.clone_to_staging(url)?;
        let repo = Repository::open(&staging)?;
        let rev = Self::checkout_reference(&repo, reference)
            .with_context(|| format!("failed to check out `{}` for `{}`", reference.value(), name))?;
        drop(repo);

        let dest = self.checkout_dir(url, &rev);
        let checkout = self.commit_checkout(staging, &dest)?;

        let manifest = Manifest::load(&checkout).map_err(|_| Error::DependencyPathNotFound {
            name: name.clone(),
            path: checkout.clone(),
        })?;

        if manifest.name != *name {
            return Err(Error::DependencyNotFound { name: name.clone() }.into());
        }

        Ok(vec![Registration::new(
            manifest.name.clone(),
            manifest.version.clone(),
            SourceUri::git(url.to_string(), Some(rev)),
            manifest.dependencies.clone(),
            None,
        )])
    }

    fn fetch(&self, registration: &Registration) -> Result<PathBuf> {
        let source = registration.source();
        let url: Url = source
            .value()
            .parse()
            .map_err(|_| Error::DependencyUnknownSource {
                name: registration.name().to_string(),
                source_value: source.to_string(),
            })?;
        let rev = source
            .details()
            .ok_or_else(|| Error::DependencyUnknownSource {
                name: registration.name().to_string(),
                source_value: source.to_string(),
            })?;

        self.ensure_checkout(&url, rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkout_dir_layout() {
        let tmp = TempDir::new().unwrap();
        let source = GitSource::new(tmp.path());
        let url: Url = "https://github.com/user/vba-json.git".parse().unwrap();

        let dir = source.checkout_dir(&url, "0123456789abcdef0123");
        assert!(dir.ends_with("github.com/user-vba-json@0123456789ab"));
        assert!(dir.starts_with(tmp.path().join("git")));
    }

    #[test]
    fn test_supports_only_git() {
        let tmp = TempDir::new().unwrap();
        let source = GitSource::new(tmp.path());

        let git = Dependency::Git {
            name: "repo".into(),
            url: "https://example.com/repo".parse().unwrap(),
            reference: GitReference::Tag("v1".into()),
            version: None,
        };
        let path = Dependency::Path {
            name: "local".into(),
            path: tmp.path().to_path_buf(),
            version: None,
        };

        assert!(source.supports(&git));
        assert!(!source.supports(&path));
    }
}
