//! Target - a container document produced by the build.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::errors::Error;

/// Supported target container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Macro-enabled Excel workbook
    Xlsm,
    /// Excel add-in
    Xlam,
}

impl TargetKind {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetKind::Xlsm => "xlsm",
            TargetKind::Xlam => "xlam",
        }
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "xlsm" => Ok(TargetKind::Xlsm),
            "xlam" => Ok(TargetKind::Xlam),
            _ => Err(Error::AddinUnsupportedType {
                kind: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetKind,
    pub name: String,

    /// Output directory, relative to the project root
    pub path: PathBuf,

    /// Output filename (`{name}.{ext}`)
    pub filename: String,

    /// Start from a blank template instead of the existing file
    pub blank: bool,
}

impl Target {
    pub fn new(kind: TargetKind, name: impl Into<String>, path: PathBuf, blank: bool) -> Self {
        let name = name.into();
        let filename = format!("{}.{}", name, kind.extension());
        Target {
            kind,
            name,
            path,
            filename,
            blank,
        }
    }

    /// Absolute path of the target document.
    pub fn file_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.path).join(&self.filename)
    }

    /// Check whether this target matches a CLI selector (type or name).
    pub fn matches(&self, selector: &str) -> bool {
        self.name == selector || self.kind.extension() == selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_parse() {
        assert_eq!("xlsm".parse::<TargetKind>().unwrap(), TargetKind::Xlsm);
        assert_eq!("xlam".parse::<TargetKind>().unwrap(), TargetKind::Xlam);

        let err = "docx".parse::<TargetKind>().unwrap_err();
        assert_eq!(err.kind(), "addin-unsupported-type");
    }

    #[test]
    fn test_target_paths() {
        let target = Target::new(TargetKind::Xlsm, "report", PathBuf::from("build"), false);

        assert_eq!(target.filename, "report.xlsm");
        assert_eq!(
            target.file_path(Path::new("/proj")),
            PathBuf::from("/proj/build/report.xlsm")
        );
        assert!(target.matches("xlsm"));
        assert!(target.matches("report"));
        assert!(!target.matches("xlam"));
    }
}
