//! Source identification - WHERE registrations come from.
//!
//! A SourceUri is the flat string form `{type}+{value}[#{details}]` used in
//! registration ids and the lockfile: `registry+default`,
//! `path+../packages/json/`, `git+https://example.com/repo#<commit>`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::errors::Error;

/// The kind of registration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Registry,
    Path,
    Git,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Registry => "registry",
            SourceKind::Path => "path",
            SourceKind::Git => "git",
        }
    }
}

/// A parsed source URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUri {
    kind: SourceKind,
    value: String,
    details: Option<String>,
}

impl SourceUri {
    /// Source URI for a named registry.
    pub fn registry(name: impl Into<String>) -> Self {
        SourceUri {
            kind: SourceKind::Registry,
            value: name.into(),
            details: None,
        }
    }

    /// Source URI for a local path.
    pub fn path(path: &Path) -> Self {
        SourceUri {
            kind: SourceKind::Path,
            value: path.to_string_lossy().into_owned(),
            details: None,
        }
    }

    /// Source URI for a git repository, optionally pinned to a commit.
    pub fn git(url: impl Into<String>, rev: Option<String>) -> Self {
        SourceUri {
            kind: SourceKind::Git,
            value: url.into(),
            details: rev,
        }
    }

    /// Parse `{type}+{value}[#{details}]`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (kind_str, rest) = s.split_once('+').ok_or_else(|| Error::SourceUnrecognizedType {
            uri: s.to_string(),
        })?;

        let kind = match kind_str {
            "registry" => SourceKind::Registry,
            "path" => SourceKind::Path,
            "git" => SourceKind::Git,
            _ => {
                return Err(Error::SourceUnrecognizedType {
                    uri: s.to_string(),
                })
            }
        };

        let (value, details) = match rest.rsplit_once('#') {
            Some((v, d)) => (v.to_string(), Some(d.to_string())),
            None => (rest.to_string(), None),
        };

        Ok(SourceUri {
            kind,
            value,
            details,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Attach details (e.g. a resolved git commit).
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Replace the value, keeping kind and details.
    ///
    /// The lockfile codec uses this to swap absolute and relative path forms.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn is_registry(&self) -> bool {
        self.kind == SourceKind::Registry
    }

    pub fn is_path(&self) -> bool {
        self.kind == SourceKind::Path
    }

    pub fn is_git(&self) -> bool {
        self.kind == SourceKind::Git
    }

    /// The value as a filesystem path, for path sources.
    pub fn as_path(&self) -> Option<PathBuf> {
        if self.is_path() {
            Some(PathBuf::from(&self.value))
        } else {
            None
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.kind.as_str(), self.value)?;
        if let Some(details) = &self.details {
            write!(f, "#{}", details)?;
        }
        Ok(())
    }
}
