//! Component - a single importable VBA module plus optional binary sidecar.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::errors::Error;

/// The component type, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// `.bas` standard module
    Standard,
    /// `.cls` class module
    Class,
    /// `.frm` user form (with `.frx` binary sidecar)
    Form,
    /// `.doccls` document module (ThisWorkbook, sheets)
    Document,
}

impl ComponentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "bas" => Some(ComponentKind::Standard),
            "cls" => Some(ComponentKind::Class),
            "frm" => Some(ComponentKind::Form),
            "doccls" => Some(ComponentKind::Document),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ComponentKind::Standard => "bas",
            ComponentKind::Class => "cls",
            ComponentKind::Form => "frm",
            ComponentKind::Document => "doccls",
        }
    }
}

/// A type library reference required by a component set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reference {
    pub name: String,
    pub guid: String,
    pub major: u32,
    pub minor: u32,
}

/// Source details for a component: where it lives on disk and what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDetails {
    /// Path of the component file
    pub path: PathBuf,

    /// Binary sidecar (forms only)
    pub binary: Option<PathBuf>,

    /// References this component's project contributes
    pub references: Vec<Reference>,
}

/// A fully-populated component.
///
/// Constructed in one step from its backing file; there are no fields that
/// get filled in later by side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    name: String,
    filename: String,
    kind: ComponentKind,
    code: String,
    details: ComponentDetails,
}

fn vb_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?m)^Attribute VB_Name = "([^"]*)""#).expect("static pattern")
    })
}

impl Component {
    /// Load a component from its file, attaching the references its
    /// project declares.
    pub fn load(path: &Path, references: Vec<Reference>) -> Result<Self, Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let kind = ComponentKind::from_extension(ext).ok_or_else(|| {
            Error::ComponentUnrecognized {
                path: path.to_path_buf(),
            }
        })?;

        let code =
            std::fs::read_to_string(path).map_err(|_| Error::ComponentUnrecognized {
                path: path.to_path_buf(),
            })?;

        let binary = match kind {
            ComponentKind::Form => {
                let sidecar = path.with_extension("frx");
                sidecar.exists().then_some(sidecar)
            }
            _ => None,
        };

        Self::from_parts(path, kind, code, binary, references)
    }

    /// Construct from already-read parts; shared by `load` and the export
    /// re-fold path.
    pub fn from_parts(
        path: &Path,
        kind: ComponentKind,
        code: String,
        binary: Option<PathBuf>,
        references: Vec<Reference>,
    ) -> Result<Self, Error> {
        let name = vb_name_pattern()
            .captures(&code)
            .map(|c| c[1].to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::ComponentInvalidNoName {
                path: path.to_path_buf(),
            })?;

        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", name, kind.extension()));

        Ok(Component {
            name,
            filename,
            kind,
            code,
            details: ComponentDetails {
                path: path.to_path_buf(),
                binary,
                references,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn details(&self) -> &ComponentDetails {
        &self.details
    }

    pub fn binary_path(&self) -> Option<&Path> {
        self.details.binary.as_deref()
    }

    /// The staged filename: `{name}.{ext}`.
    pub fn staged_filename(&self) -> String {
        format!("{}.{}", self.name, self.kind.extension())
    }

    /// Read the binary sidecar, if any.
    pub fn binary_bytes(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match &self.details.binary {
            Some(path) => Ok(Some(std::fs::read(path)?)),
            None => Ok(None),
        }
    }
}
